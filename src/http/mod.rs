//! HTTP API over the store and the recording pipeline
//!
//! - GET /api/status - Pipeline state
//! - GET /api/sessions, GET /api/sessions/:id - Session rows
//! - POST /api/sessions, POST /api/sessions/stop - Start/stop recording
//! - GET /api/tracks?session_id= - Tracks of a session
//! - GET/PUT /api/config - Conversion settings
//! - GET /api/logs/stream - Recent events as SSE
//! - GET /api/spotify/auth, /api/spotify/callback - OAuth redirect
//! - GET /metrics - Plaintext counters when enabled
//! - GET /health - Health check

mod error;
mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
