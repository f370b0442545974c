use super::{now_ts, Store};
use crate::error::{Error, Result};
use serde::Serialize;
use tracing::info;

/// One finished audio file; never updated after insertion
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Track {
    pub id: i64,
    pub session_id: i64,
    /// Position within the session, assigned by the caller
    pub idx: i64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_s: Option<i64>,
    pub lufs: Option<f64>,
    pub true_peak: Option<f64>,
    pub path: Option<String>,
    pub created_at: Option<String>,
}

/// Values for [`Store::add_track`]
#[derive(Debug, Clone, Default)]
pub struct NewTrack {
    pub session_id: i64,
    pub idx: i64,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_s: i64,
    pub lufs: Option<f64>,
    pub true_peak: Option<f64>,
    pub path: String,
}

impl Store {
    /// Insert a track for an existing session and return its id
    ///
    /// `idx` is not deduplicated; callers keep it unique within the session.
    pub async fn add_track(&self, track: &NewTrack) -> Result<i64> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM sessions WHERE id = ?")
            .bind(track.session_id)
            .fetch_optional(self.pool())
            .await?;
        if exists.is_none() {
            return Err(Error::not_found("Session", track.session_id));
        }

        let id = sqlx::query(
            "INSERT INTO tracks (session_id, idx, title, artist, album, duration_s, lufs, true_peak, path, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(track.session_id)
        .bind(track.idx)
        .bind(&track.title)
        .bind(&track.artist)
        .bind(&track.album)
        .bind(track.duration_s)
        .bind(track.lufs)
        .bind(track.true_peak)
        .bind(&track.path)
        .bind(now_ts())
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        info!(
            "Track {} added to session {} at position {}: {}",
            id, track.session_id, track.idx, track.path
        );
        Ok(id)
    }

    /// Tracks of a session in ascending `idx` order
    pub async fn get_tracks(&self, session_id: i64) -> Result<Vec<Track>> {
        let tracks = sqlx::query_as::<_, Track>(
            "SELECT id, session_id, idx, title, artist, album, duration_s, lufs, true_peak, path, created_at
             FROM tracks WHERE session_id = ? ORDER BY idx, id",
        )
        .bind(session_id)
        .fetch_all(self.pool())
        .await?;

        Ok(tracks)
    }

    /// One past the highest `idx` used in the session, 0 for an empty session
    pub async fn next_track_index(&self, session_id: i64) -> Result<i64> {
        let next: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(idx) + 1, 0) FROM tracks WHERE session_id = ?")
                .bind(session_id)
                .fetch_one(self.pool())
                .await?;

        Ok(next)
    }
}
