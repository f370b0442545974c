use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Display name; also used as album tag
    pub name: String,

    /// Artist tag for every track of the session
    pub artist: String,

    /// Target device slot
    pub tonie_index: i64,

    /// Named pipe the PCM producer writes into
    pub fifo_path: PathBuf,

    /// Raw segments are spooled here until encoded
    pub spool_dir: PathBuf,

    /// Finished tracks go to `<output_dir>/session-<id>/`
    pub output_dir: PathBuf,

    /// Seconds of source audio per track
    /// Default: 600 seconds (10 minutes)
    pub segment_secs: u64,

    /// Ingest channel capacity in 4 KiB chunks
    pub channel_capacity: usize,
}

impl SessionConfig {
    pub fn from_config(cfg: &Config, name: String, artist: String, tonie_index: i64) -> Self {
        Self {
            name,
            artist,
            tonie_index,
            fifo_path: cfg.paths.fifo.clone(),
            spool_dir: cfg.paths.spool_dir.clone(),
            output_dir: cfg.paths.output_dir.clone(),
            segment_secs: cfg.recording.segment_secs,
            channel_capacity: cfg.recording.channel_capacity,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "Aufnahme".to_string(),
            artist: String::new(),
            tonie_index: 1,
            fifo_path: PathBuf::from("/fifo/spotout"),
            spool_dir: PathBuf::from("/app/spool"),
            output_dir: PathBuf::from("/app/output"),
            segment_secs: 600, // 10 minutes
            channel_capacity: 64,
        }
    }
}
