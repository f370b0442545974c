// Tests for the HTTP API
//
// Requests go straight to the router; no socket is opened.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tonie_worker::store::{NewTrack, Store};
use tonie_worker::{create_router, AppState, Config, Converter, Encoder};
use tower::ServiceExt;

async fn setup() -> (Router, Store) {
    let store = Store::in_memory().await.unwrap();
    let config = Config::defaults().unwrap();
    let state = AppState::new(store.clone(), Converter::new(Encoder::new("ffmpeg")), config);
    (create_router(state), store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup().await;
    let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn test_status_when_idle() {
    let (app, _) = setup().await;
    let (status, body) = get_json(&app, "/api/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");
    assert_eq!(body["current"], Value::Null);
    assert_eq!(body["preset"], "speech");
    assert_eq!(body["output_dir"], "/app/output");
    assert_eq!(body["spotify_connected"], false);
}

#[tokio::test]
async fn test_sessions_listing_and_lookup() {
    let (app, store) = setup().await;
    let first = store.start_session("Bedtime", "ArtistX", "speech", 1).await.unwrap();
    let second = store.start_session("Morning", "ArtistY", "music", 2).await.unwrap();
    store.end_session(first).await.unwrap();

    let (status, body) = get_json(&app, "/api/sessions").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![second, first]);

    let (status, body) = get_json(&app, &format!("/api/sessions/{}", first)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Bedtime");
    assert!(body["ended_at"].is_string());
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let (app, _) = setup().await;
    let (status, body) = get_json(&app, "/api/sessions/42").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("42"));
}

#[tokio::test]
async fn test_tracks_for_session() {
    let (app, store) = setup().await;
    let session_id = store.start_session("Bedtime", "ArtistX", "speech", 1).await.unwrap();
    for idx in [1, 0] {
        store
            .add_track(&NewTrack {
                session_id,
                idx,
                title: format!("Bedtime - Teil {}", idx + 1),
                artist: "ArtistX".to_string(),
                album: "Bedtime".to_string(),
                duration_s: 600,
                lufs: None,
                true_peak: None,
                path: format!("/app/output/{:02}.mp3", idx + 1),
            })
            .await
            .unwrap();
    }

    let (status, body) = get_json(&app, &format!("/api/tracks?session_id={}", session_id)).await;
    assert_eq!(status, StatusCode::OK);

    let tracks = body.as_array().unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0]["idx"], 0);
    assert_eq!(tracks[1]["title"], "Bedtime - Teil 2");
}

#[tokio::test]
async fn test_config_partial_update() {
    let (app, _) = setup().await;

    let request = Request::put("/api/config")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "bitrate_k": 128, "mono": false }).to_string()))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let updated: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(updated["bitrate_k"], 128);
    assert_eq!(updated["mono"], false);

    let (_, current) = get_json(&app, "/api/config").await;
    assert_eq!(current["bitrate_k"], 128);
    assert_eq!(current["preset"], "speech");
    assert_eq!(current["target_lufs"], -18.0);
}

#[tokio::test]
async fn test_stop_without_recording_is_404() {
    let (app, _) = setup().await;
    let request = Request::post("/api/sessions/stop").body(Body::empty()).unwrap();
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_toggle() {
    let (app, store) = setup().await;

    let (status, _) = send(&app, Request::get("/metrics").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    store.set_setting("metrics_enabled", "true").await.unwrap();
    store.start_session("Bedtime", "", "speech", 1).await.unwrap();

    let (status, body) = send(&app, Request::get("/metrics").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);

    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("tonie_sessions_total 1"), "{}", text);
    assert!(text.contains("tonie_sessions_open 1"), "{}", text);
    assert!(text.contains("tonie_recording 0"), "{}", text);
}

#[tokio::test]
async fn test_spotify_auth_requires_credentials() {
    let (app, store) = setup().await;

    let (status, _) = get_json(&app, "/api/spotify/auth").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    store.set_setting("spotify_client_id", "abc123").await.unwrap();
    store
        .set_setting("spotify_redirect_uri", "http://localhost:8080/api/spotify/callback")
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(Request::get("/api/spotify/auth").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://accounts.spotify.com/authorize?"));
    assert!(location.contains("client_id=abc123"));
    assert!(location.contains("response_type=code"));
}

#[tokio::test]
async fn test_spotify_callback() {
    let (app, _) = setup().await;

    let (status, _) = get_json(&app, "/api/spotify/callback").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_json(&app, "/api/spotify/callback?error=access_denied").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_json(&app, "/api/spotify/callback?code=xyz&state=s").await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_log_stream_replays_events() {
    let (app, store) = setup().await;
    store
        .log_event(tonie_worker::EventLevel::Info, "hello", None, None)
        .await
        .unwrap();

    let (status, body) =
        send(&app, Request::get("/api/logs/stream").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);

    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("data:"));
    assert!(text.contains("hello"));
}

#[tokio::test]
async fn test_stop_active_without_session() {
    let store = Store::in_memory().await.unwrap();
    let config = Config::defaults().unwrap();
    let state = AppState::new(store, Converter::new(Encoder::new("ffmpeg")), config);

    assert!(state.stop_active().await.unwrap().is_none());
}

#[tokio::test]
async fn test_start_and_stop_recording() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = Store::in_memory().await.unwrap();
    let mut config = Config::defaults().unwrap();
    config.paths.fifo = dir.path().join("spotout");
    config.paths.spool_dir = dir.path().join("spool");
    config.paths.output_dir = dir.path().join("out");

    let state = AppState::new(store.clone(), Converter::new(Encoder::new("ffmpeg")), config);
    let app = create_router(state.clone());

    let start = || {
        Request::post("/api/sessions")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "name": "Bedtime", "artist": "ArtistX" }).to_string()))
            .unwrap()
    };

    let (status, body) = send(&app, start()).await;
    assert_eq!(status, StatusCode::OK);
    let started: Value = serde_json::from_slice(&body).unwrap();
    let session_id = started["session_id"].as_i64().unwrap();

    let (_, status_body) = get_json(&app, "/api/status").await;
    assert_eq!(status_body["state"], "recording");
    assert_eq!(status_body["active_session_id"], session_id);

    let (status, _) = send(&app, start()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // No writer ever attached, so the session ends without tracks
    let stats = state.stop_active().await.unwrap().unwrap();
    assert_eq!(stats.session_id, session_id);
    assert!(!stats.is_recording);
    assert_eq!(stats.tracks_converted, 0);

    let session = store.get_session(session_id).await.unwrap();
    assert!(session.ended_at.is_some());
    assert_eq!(session.tonie_index, Some(1));

    let (_, status_body) = get_json(&app, "/api/status").await;
    assert_eq!(status_body["state"], "idle");

    let request = Request::post("/api/sessions/stop").body(Body::empty()).unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
