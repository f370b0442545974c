//! SQLite-backed metadata store
//!
//! One explicit handle, created at startup and shared by reference. Every
//! operation is a single auto-committed statement; there is no transactional
//! coupling between session, track and event writes, so a crash between steps
//! can leave a session without its tracks.

mod auth;
mod events;
mod sessions;
mod settings;
mod tracks;

pub use auth::AuthToken;
pub use events::{Event, EventLevel};
pub use sessions::Session;
pub use settings::{
    parse_bool, ConfigUpdate, ConversionSettings, IntegrationSettings, SETTING_BITRATE_K,
    SETTING_MAX_TONIE_MIN, SETTING_METRICS_ENABLED, SETTING_MONO, SETTING_PRESET,
    SETTING_SPOTIFY_CLIENT_ID, SETTING_SPOTIFY_CLIENT_SECRET, SETTING_SPOTIFY_REDIRECT_URI,
    SETTING_TARGET_LUFS, SETTING_TRUE_PEAK,
};
pub use tracks::{NewTrack, Track};

use crate::error::{Error, Result};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

const SCHEMA: &str = include_str!("schema.sql");

/// Timestamp format shared by every TEXT time column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn now_ts() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Row counts exposed as metrics
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreCounts {
    pub sessions: i64,
    pub open_sessions: i64,
    pub tracks: i64,
    pub events: i64,
}

/// Handle to the metadata database
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Connect to `database_url`, creating the file (and its directory) if missing
    ///
    /// The schema is not touched; call [`Store::migrate`] once at startup.
    pub async fn open(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| Error::Config(format!("invalid database url {}: {}", database_url, e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        if let Some(dir) = options.get_filename().parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    Error::Config(format!("cannot create {}: {}", dir.display(), e))
                })?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::Config(format!("cannot open store {}: {}", database_url, e)))?;

        info!("Store opened: {}", database_url);

        Ok(Self { pool })
    }

    /// Private in-memory database, already migrated
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // A single long-lived connection: each in-memory connection is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Create missing tables; safe to run repeatedly
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        info!("Store schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn counts(&self) -> Result<StoreCounts> {
        let (sessions, open_sessions, tracks, events): (i64, i64, i64, i64) = sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM sessions),
                (SELECT COUNT(*) FROM sessions WHERE ended_at IS NULL),
                (SELECT COUNT(*) FROM tracks),
                (SELECT COUNT(*) FROM events)",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreCounts {
            sessions,
            open_sessions,
            tracks,
            events,
        })
    }
}
