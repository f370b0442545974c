use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/api/status", get(handlers::get_status))
        // Sessions and tracks
        .route(
            "/api/sessions",
            get(handlers::list_sessions).post(handlers::start_recording),
        )
        .route("/api/sessions/stop", post(handlers::stop_recording))
        .route("/api/sessions/:id", get(handlers::get_session))
        .route("/api/tracks", get(handlers::get_tracks))
        // Conversion settings
        .route(
            "/api/config",
            get(handlers::get_config).put(handlers::put_config),
        )
        .route("/api/logs/stream", get(handlers::stream_logs))
        // Third-party authorization
        .route("/api/spotify/auth", get(handlers::spotify_auth))
        .route("/api/spotify/callback", get(handlers::spotify_callback))
        .route("/metrics", get(handlers::metrics))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
