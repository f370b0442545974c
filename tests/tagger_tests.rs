// Tests for ID3v2 tagging of encoded tracks

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tonie_worker::pipeline::{read_tags, write_tags, TrackTags};
use tonie_worker::Error;

/// Write a minimal MPEG-1 Layer III stream (128 kbps, 44.1 kHz, silent frames)
fn write_silent_mp3(dir: &Path) -> PathBuf {
    const FRAME_LEN: usize = 417;
    let mut data = Vec::with_capacity(FRAME_LEN * 20);
    for _ in 0..20 {
        let mut frame = vec![0u8; FRAME_LEN];
        frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x64]);
        data.extend_from_slice(&frame);
    }

    let path = dir.join("track.mp3");
    std::fs::write(&path, data).unwrap();
    path
}

#[test]
fn test_tags_written_and_read_back() {
    let dir = TempDir::new().unwrap();
    let path = write_silent_mp3(dir.path());

    let tags = TrackTags::new("Story - Teil 1", "ArtistX", "Bedtime")
        .with_track_number(1)
        .with_comment("Aufgenommen am Abend");
    write_tags(&path, &tags).unwrap();

    let read = read_tags(&path).unwrap();
    assert_eq!(read, tags);
}

#[test]
fn test_missing_values_become_empty_strings() {
    let dir = TempDir::new().unwrap();
    let path = write_silent_mp3(dir.path());

    let tags = TrackTags {
        title: Some("Only a title".to_string()),
        ..TrackTags::default()
    };
    write_tags(&path, &tags).unwrap();

    let read = read_tags(&path).unwrap();
    assert_eq!(read.title.as_deref(), Some("Only a title"));
    assert_eq!(read.artist.as_deref().unwrap_or(""), "");
    assert_eq!(read.album.as_deref().unwrap_or(""), "");
    assert_eq!(read.track_number.as_deref().unwrap_or(""), "");
    assert_eq!(read.comment, None);
}

#[test]
fn test_retagging_replaces_fields() {
    let dir = TempDir::new().unwrap();
    let path = write_silent_mp3(dir.path());

    write_tags(&path, &TrackTags::new("First", "A", "Album")).unwrap();
    write_tags(&path, &TrackTags::new("Second", "B", "Album").with_track_number(2)).unwrap();

    let read = read_tags(&path).unwrap();
    assert_eq!(read.title.as_deref(), Some("Second"));
    assert_eq!(read.artist.as_deref(), Some("B"));
    assert_eq!(read.track_number.as_deref(), Some("2"));
}

#[test]
fn test_unparsable_file_is_a_tag_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.mp3");
    std::fs::write(&path, b"this is plain text, not audio at all").unwrap();

    let err = write_tags(&path, &TrackTags::new("t", "a", "b")).unwrap_err();
    assert!(matches!(err, Error::Tag { .. }), "{:?}", err);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = write_tags(&dir.path().join("nope.mp3"), &TrackTags::default()).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
