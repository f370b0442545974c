use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Store id of the session
    pub session_id: i64,

    /// Whether recording is currently active
    pub is_recording: bool,

    /// When the recording started
    pub started_at: DateTime<Utc>,

    /// Wall-clock duration in seconds
    pub duration_secs: f64,

    /// Tracks encoded, tagged and stored so far
    pub tracks_converted: usize,

    /// Segments whose conversion failed
    pub tracks_failed: usize,

    /// Output path of the track currently being encoded
    pub current: Option<String>,
}
