use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::session::{RecordingSession, SessionConfig, SessionStats};
use crate::store::{ConfigUpdate, ConversionSettings, IntegrationSettings, Session, Track};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event as SseEvent, Sse},
        IntoResponse, Json, Redirect,
    },
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Events replayed by the log stream
const LOG_STREAM_LIMIT: i64 = 100;

const SPOTIFY_AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
const SPOTIFY_SCOPES: &str = "user-read-playback-state user-modify-playback-state streaming";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// "idle" or "recording"
    pub state: String,
    /// Track currently being encoded
    pub current: Option<String>,
    pub preset: String,
    pub output_dir: String,
    pub active_session_id: Option<i64>,
    pub spotify_connected: bool,
}

#[derive(Debug, Deserialize)]
pub struct TracksQuery {
    pub session_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct StartRecordingRequest {
    pub name: String,

    #[serde(default)]
    pub artist: String,

    /// Target device slot (default: 1)
    pub tonie_index: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct StartRecordingResponse {
    pub session_id: i64,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopRecordingResponse {
    pub session_id: i64,
    pub status: String,
    pub stats: SessionStats,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /
pub async fn root() -> Redirect {
    Redirect::temporary("/api/status")
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let settings = ConversionSettings::load(&state.store).await?;
    let spotify_connected = state.store.latest_auth_token().await?.is_some();

    let active = state.active.read().await.clone();
    let (recording, current, active_session_id) = match active {
        Some(session) => {
            let stats = session.get_stats().await;
            (stats.is_recording, stats.current, Some(stats.session_id))
        }
        None => (false, None, None),
    };

    Ok(Json(StatusResponse {
        state: if recording { "recording" } else { "idle" }.to_string(),
        current,
        preset: settings.preset,
        output_dir: state.config.paths.output_dir.display().to_string(),
        active_session_id,
        spotify_connected,
    }))
}

/// GET /api/sessions
/// All sessions, newest first
pub async fn list_sessions(State(state): State<AppState>) -> ApiResult<Json<Vec<Session>>> {
    Ok(Json(state.store.list_sessions().await?))
}

/// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Session>> {
    Ok(Json(state.store.get_session(id).await?))
}

/// GET /api/tracks?session_id=
pub async fn get_tracks(
    State(state): State<AppState>,
    Query(query): Query<TracksQuery>,
) -> ApiResult<Json<Vec<Track>>> {
    Ok(Json(state.store.get_tracks(query.session_id).await?))
}

/// GET /api/config
pub async fn get_config(State(state): State<AppState>) -> ApiResult<Json<ConversionSettings>> {
    Ok(Json(ConversionSettings::load(&state.store).await?))
}

/// PUT /api/config
/// Partial update: fields left out of the body are untouched
pub async fn put_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdate>,
) -> ApiResult<Json<ConversionSettings>> {
    let written = state.store.apply_config_update(&update).await?;
    info!("Configuration updated ({} keys)", written);

    Ok(Json(ConversionSettings::load(&state.store).await?))
}

/// POST /api/sessions
/// Start a recording session from the stream source
pub async fn start_recording(
    State(state): State<AppState>,
    Json(req): Json<StartRecordingRequest>,
) -> ApiResult<Json<StartRecordingResponse>> {
    // Hold the write lock so two requests cannot both start a session
    let mut active = state.active.write().await;
    if let Some(session) = active.as_ref() {
        return Err(ApiError::Conflict(format!(
            "Session {} is already recording",
            session.id()
        )));
    }

    let config = SessionConfig::from_config(
        &state.config,
        req.name.clone(),
        req.artist,
        req.tonie_index.unwrap_or(1),
    );

    let session = RecordingSession::start(state.store.clone(), state.converter.clone(), config)
        .await
        .map_err(|e| {
            error!("Failed to start recording: {}", e);
            ApiError::from(e)
        })?;

    let session_id = session.id();
    *active = Some(Arc::new(session));

    info!("Recording started successfully for session: {}", session_id);

    Ok(Json(StartRecordingResponse {
        session_id,
        status: "recording".to_string(),
        message: format!("Recording started: {}", req.name),
    }))
}

/// POST /api/sessions/stop
/// Stop the active recording session
pub async fn stop_recording(
    State(state): State<AppState>,
) -> ApiResult<Json<StopRecordingResponse>> {
    let stats = state
        .stop_active()
        .await?
        .ok_or_else(|| ApiError::NotFound("No active recording".to_string()))?;

    Ok(Json(StopRecordingResponse {
        session_id: stats.session_id,
        status: "stopped".to_string(),
        stats,
    }))
}

/// GET /api/logs/stream
/// Latest events as server-sent events, newest first
pub async fn stream_logs(
    State(state): State<AppState>,
) -> ApiResult<Sse<impl Stream<Item = Result<SseEvent, axum::Error>>>> {
    let events = state.store.recent_events(LOG_STREAM_LIMIT).await?;

    let stream = stream::iter(
        events
            .into_iter()
            .map(|event| SseEvent::default().json_data(event)),
    );

    Ok(Sse::new(stream))
}

/// GET /api/spotify/auth
/// Redirect to the provider's consent page
pub async fn spotify_auth(State(state): State<AppState>) -> ApiResult<Redirect> {
    let stored = IntegrationSettings::load(&state.store).await?;
    let client_id = stored
        .spotify_client_id
        .or_else(|| state.config.spotify.client_id.clone())
        .ok_or_else(|| ApiError::BadRequest("Spotify client id is not configured".to_string()))?;
    let redirect_uri = stored
        .spotify_redirect_uri
        .or_else(|| state.config.spotify.redirect_uri.clone())
        .ok_or_else(|| {
            ApiError::BadRequest("Spotify redirect URI is not configured".to_string())
        })?;

    let oauth_state = uuid::Uuid::new_v4().to_string();
    let url = url::Url::parse_with_params(
        SPOTIFY_AUTHORIZE_URL,
        &[
            ("client_id", client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", redirect_uri.as_str()),
            ("scope", SPOTIFY_SCOPES),
            ("state", oauth_state.as_str()),
        ],
    )
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Redirect::temporary(url.as_str()))
}

/// GET /api/spotify/callback
pub async fn spotify_callback(Query(query): Query<OAuthCallbackQuery>) -> ApiResult<StatusCode> {
    if let Some(error) = query.error {
        return Err(ApiError::BadRequest(format!("Authorization denied: {}", error)));
    }
    if query.code.is_none() {
        return Err(ApiError::BadRequest("Missing authorization code".to_string()));
    }

    info!("OAuth callback received (state: {:?})", query.state);
    Err(ApiError::NotImplemented(
        "Token exchange is not implemented".to_string(),
    ))
}

/// GET /metrics
/// Plaintext counters, only when `metrics_enabled` is set
pub async fn metrics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let settings = ConversionSettings::load(&state.store).await?;
    if !settings.metrics_enabled {
        return Err(ApiError::NotFound("Metrics are disabled".to_string()));
    }

    let counts = state.store.counts().await?;
    let recording = match state.active.read().await.as_ref() {
        Some(session) => u8::from(session.get_stats().await.is_recording),
        None => 0,
    };

    let body = format!(
        "# TYPE tonie_sessions_total counter\n\
         tonie_sessions_total {}\n\
         # TYPE tonie_sessions_open gauge\n\
         tonie_sessions_open {}\n\
         # TYPE tonie_tracks_total counter\n\
         tonie_tracks_total {}\n\
         # TYPE tonie_events_total counter\n\
         tonie_events_total {}\n\
         # TYPE tonie_recording gauge\n\
         tonie_recording {}\n",
        counts.sessions, counts.open_sessions, counts.tracks, counts.events, recording
    );

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
