use super::{now_ts, Store};
use crate::error::Result;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

impl EventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only log entry
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Event {
    pub id: i64,
    pub ts: String,
    pub level: String,
    pub msg: String,
    pub session_id: Option<i64>,
    pub track_id: Option<i64>,
}

impl Store {
    pub async fn log_event(
        &self,
        level: EventLevel,
        msg: &str,
        session_id: Option<i64>,
        track_id: Option<i64>,
    ) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO events (ts, level, msg, session_id, track_id) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(now_ts())
        .bind(level.as_str())
        .bind(msg)
        .bind(session_id)
        .bind(track_id)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    /// Latest `limit` events, newest first
    pub async fn recent_events(&self, limit: i64) -> Result<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(
            "SELECT id, ts, level, msg, session_id, track_id
             FROM events ORDER BY ts DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(events)
    }
}
