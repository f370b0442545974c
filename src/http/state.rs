use crate::config::Config;
use crate::error::Result;
use crate::pipeline::Converter;
use crate::session::{RecordingSession, SessionStats};
use crate::store::Store;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub converter: Converter,
    pub config: Arc<Config>,
    /// The one recording session that may be active at a time
    pub active: Arc<RwLock<Option<Arc<RecordingSession>>>>,
}

impl AppState {
    pub fn new(store: Store, converter: Converter, config: Config) -> Self {
        Self {
            store,
            converter,
            config: Arc::new(config),
            active: Arc::new(RwLock::new(None)),
        }
    }

    /// Stop the active recording session, if there is one
    ///
    /// The session is detached from the state before it is stopped, so a new
    /// one can be started while the last segment is still being converted.
    pub async fn stop_active(&self) -> Result<Option<SessionStats>> {
        let recording = self.active.write().await.take();
        match recording {
            Some(recording) => Ok(Some(recording.stop().await?)),
            None => Ok(None),
        }
    }
}
