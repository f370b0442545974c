// Integration tests for the metadata store
//
// Each test gets its own database file in a temporary directory.

use anyhow::Result;
use tempfile::TempDir;
use tonie_worker::store::{ConfigUpdate, ConversionSettings, EventLevel, NewTrack, Store};

async fn open_store(dir: &TempDir) -> Result<Store> {
    let url = format!("sqlite://{}", dir.path().join("db").join("tonie.db").display());
    let store = Store::open(&url).await?;
    store.migrate().await?;
    Ok(store)
}

fn track(session_id: i64, idx: i64, title: &str) -> NewTrack {
    NewTrack {
        session_id,
        idx,
        title: title.to_string(),
        artist: "ArtistX".to_string(),
        album: "AlbumY".to_string(),
        duration_s: 300,
        lufs: Some(-18.2),
        true_peak: Some(-1.3),
        path: format!("/out/{}.mp3", idx + 1),
    }
}

#[tokio::test]
async fn test_bedtime_scenario() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;

    let session_id = store.start_session("Bedtime", "ArtistX", "speech", 1).await?;
    assert_eq!(session_id, 1);

    let track_id = store
        .add_track(&NewTrack {
            path: "/out/1.mp3".to_string(),
            ..track(session_id, 0, "Story")
        })
        .await?;

    let tracks = store.get_tracks(session_id).await?;
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].id, track_id);
    assert_eq!(tracks[0].session_id, 1);
    assert_eq!(tracks[0].idx, 0);
    assert_eq!(tracks[0].title.as_deref(), Some("Story"));
    assert_eq!(tracks[0].path.as_deref(), Some("/out/1.mp3"));
    assert!(tracks[0].created_at.is_some());

    let open = store.get_session(session_id).await?;
    assert!(open.ended_at.is_none());
    assert_eq!(open.preset.as_deref(), Some("speech"));
    assert_eq!(open.tonie_index, Some(1));

    store.end_session(session_id).await?;
    let closed = store.get_session(session_id).await?;
    assert!(closed.ended_at.is_some());
    assert_eq!(closed.total_duration_s, Some(300));
    assert!((closed.lufs_avg.unwrap() - -18.2).abs() < 1e-9);

    Ok(())
}

#[tokio::test]
async fn test_tracks_ordered_by_idx() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;
    let session_id = store.start_session("Mix", "A", "music", 2).await?;

    for idx in [2, 0, 5, 1] {
        store.add_track(&track(session_id, idx, &format!("t{}", idx))).await?;
    }

    let idxs: Vec<i64> = store
        .get_tracks(session_id)
        .await?
        .iter()
        .map(|t| t.idx)
        .collect();
    assert_eq!(idxs, vec![0, 1, 2, 5]);
    assert_eq!(store.next_track_index(session_id).await?, 6);

    Ok(())
}

#[tokio::test]
async fn test_end_session_twice_never_clears_ended_at() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir).await?;
    let session_id = store.start_session("Twice", "", "speech", 1).await?;

    store.end_session(session_id).await?;
    let first = store.get_session(session_id).await?.ended_at;
    store.end_session(session_id).await?;
    let second = store.get_session(session_id).await?.ended_at;

    assert!(first.is_some());
    assert_eq!(first, second);

    Ok(())
}

#[tokio::test]
async fn test_track_requires_existing_session() -> Result<()> {
    let store = Store::in_memory().await?;

    let err = store.add_track(&track(99, 0, "orphan")).await.unwrap_err();
    assert!(err.is_not_found());

    let err = store.get_session(99).await.unwrap_err();
    assert!(err.is_not_found());

    Ok(())
}

#[tokio::test]
async fn test_events_newest_first() -> Result<()> {
    let store = Store::in_memory().await?;
    let session_id = store.start_session("Log", "", "speech", 1).await?;

    store.log_event(EventLevel::Info, "first", Some(session_id), None).await?;
    store.log_event(EventLevel::Warn, "second", None, None).await?;
    store.log_event(EventLevel::Error, "third", Some(session_id), Some(7)).await?;

    let events = store.recent_events(2).await?;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].msg, "third");
    assert_eq!(events[0].level, "error");
    assert_eq!(events[0].track_id, Some(7));
    assert_eq!(events[1].msg, "second");
    assert_eq!(events[1].session_id, None);

    Ok(())
}

#[tokio::test]
async fn test_settings_last_write_wins_and_partial_update() -> Result<()> {
    let store = Store::in_memory().await?;

    store.set_setting("bitrate_k", "128").await?;
    store.set_setting("bitrate_k", "64").await?;
    assert_eq!(store.get_setting("bitrate_k").await?.as_deref(), Some("64"));
    assert_eq!(store.get_setting("missing").await?, None);

    let written = store
        .apply_config_update(&ConfigUpdate {
            target_lufs: Some(-16.0),
            mono: Some(false),
            ..ConfigUpdate::default()
        })
        .await?;
    assert_eq!(written, 2);

    let settings = ConversionSettings::load(&store).await?;
    assert_eq!(settings.bitrate_k, 64);
    assert_eq!(settings.target_lufs, -16.0);
    assert!(!settings.mono);
    assert_eq!(settings.preset, "speech");

    Ok(())
}

#[tokio::test]
async fn test_auth_tokens_latest_wins() -> Result<()> {
    let store = Store::in_memory().await?;
    assert!(store.latest_auth_token().await?.is_none());

    store.save_auth_token("old", None, None).await?;
    store
        .save_auth_token("new", Some("refresh"), Some("2030-01-01 00:00:00"))
        .await?;

    let token = store.latest_auth_token().await?.unwrap();
    assert_eq!(token.access_token.as_deref(), Some("new"));
    assert_eq!(token.refresh_token.as_deref(), Some("refresh"));

    let counts = store.counts().await?;
    assert_eq!(counts.sessions, 0);

    Ok(())
}
