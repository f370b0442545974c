use super::{now_ts, Store};
use crate::error::{Error, Result};
use serde::Serialize;
use tracing::{debug, info};

/// One continuous recording/conversion run
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Session {
    pub id: i64,
    pub started_at: Option<String>,
    /// Set once, by the first `end_session`
    pub ended_at: Option<String>,
    pub name: Option<String>,
    pub artist: Option<String>,
    pub preset: Option<String>,
    pub total_duration_s: Option<i64>,
    pub lufs_avg: Option<f64>,
    /// Target device slot
    pub tonie_index: Option<i64>,
}

const SESSION_COLUMNS: &str =
    "id, started_at, ended_at, name, artist, preset, total_duration_s, lufs_avg, tonie_index";

impl Store {
    /// Create a session row and return its id
    pub async fn start_session(
        &self,
        name: &str,
        artist: &str,
        preset: &str,
        tonie_index: i64,
    ) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO sessions (started_at, name, artist, preset, tonie_index) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(now_ts())
        .bind(name)
        .bind(artist)
        .bind(preset)
        .bind(tonie_index)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        info!("Session {} started: '{}' by '{}' ({})", id, name, artist, preset);
        Ok(id)
    }

    /// Stamp the end time and roll up track totals
    ///
    /// Only the first call has an effect; later calls leave the row as it is.
    pub async fn end_session(&self, id: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE sessions SET
                ended_at = ?,
                total_duration_s = (SELECT SUM(duration_s) FROM tracks WHERE session_id = sessions.id),
                lufs_avg = (SELECT AVG(lufs) FROM tracks WHERE session_id = sessions.id)
             WHERE id = ? AND ended_at IS NULL",
        )
        .bind(now_ts())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            // Either unknown or already ended
            self.get_session(id).await?;
            debug!("Session {} already ended", id);
            return Ok(());
        }

        info!("Session {} ended", id);
        Ok(())
    }

    pub async fn get_session(&self, id: i64) -> Result<Session> {
        sqlx::query_as::<_, Session>(&format!(
            "SELECT {} FROM sessions WHERE id = ?",
            SESSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| Error::not_found("Session", id))
    }

    /// All sessions, newest first
    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        let sessions = sqlx::query_as::<_, Session>(&format!(
            "SELECT {} FROM sessions ORDER BY started_at DESC, id DESC",
            SESSION_COLUMNS
        ))
        .fetch_all(self.pool())
        .await?;

        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn end_session_keeps_first_timestamp() {
        let store = Store::in_memory().await.unwrap();
        let id = store.start_session("Bedtime", "ArtistX", "speech", 1).await.unwrap();

        store.end_session(id).await.unwrap();
        let first = store.get_session(id).await.unwrap().ended_at;
        assert!(first.is_some());

        // Force a different "now" if the second call were to overwrite
        sqlx::query("UPDATE sessions SET ended_at = '2000-01-01 00:00:00' WHERE id = ?")
            .bind(id)
            .execute(store.pool())
            .await
            .unwrap();
        store.end_session(id).await.unwrap();

        let ended = store.get_session(id).await.unwrap().ended_at;
        assert_eq!(ended.as_deref(), Some("2000-01-01 00:00:00"));
    }

    #[tokio::test]
    async fn end_unknown_session_is_not_found() {
        let store = Store::in_memory().await.unwrap();
        let err = store.end_session(42).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
