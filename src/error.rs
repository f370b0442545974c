//! Error types for the conversion pipeline and the store

use thiserror::Error;

/// Result type for pipeline and store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the immediate caller of a pipeline or store operation
#[derive(Error, Debug)]
pub enum Error {
    /// Missing credentials, unreachable store path, malformed settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// The ingest special file could not be created or opened
    #[error("Stream setup failed for {path}: {reason}")]
    StreamSetup { path: String, reason: String },

    /// The ingest loop failed after it was started
    #[error("Ingest failed: {0}")]
    Ingest(String),

    /// Encoder process failed for the current track
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// Tags could not be written into an encoded file
    #[error("Tagging failed for {path}: {reason}")]
    Tag { path: String, reason: String },

    /// Encoded output could not be decoded or measured
    #[error("Loudness analysis failed: {0}")]
    Analysis(String),

    /// Entity not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Database error from `SQLx`
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn stream_setup(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StreamSetup {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn tag(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Tag {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

