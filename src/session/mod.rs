//! Recording session management
//!
//! This module provides the `RecordingSession` abstraction that manages:
//! - PCM ingest from the named pipe
//! - Spooling into fixed-length raw segments
//! - Conversion of each finished segment into a tagged MP3
//! - Session, track and event rows in the store

mod config;
mod session;
mod stats;

pub use config::SessionConfig;
pub use session::{convert_and_record, convert_file, track_file_name, RecordingSession};
pub use stats::SessionStats;
