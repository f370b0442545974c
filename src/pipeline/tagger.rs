//! ID3v2 tag writing for encoded tracks
//!
//! Tags are written in place after a successful encode. Every text field is
//! always written; a missing value becomes an empty string.

use crate::error::{Error, Result};
use lofty::config::{ParseOptions, WriteOptions};
use lofty::file::AudioFile;
use lofty::id3::v2::{CommentFrame, Frame, FrameId, Id3v2Tag, TextInformationFrame};
use lofty::mpeg::MpegFile;
use lofty::tag::TagExt;
use lofty::TextEncoding;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Language of the comment frame (ISO 639-2)
pub const COMMENT_LANGUAGE: [u8; 3] = *b"deu";
/// Content descriptor of the comment frame
pub const COMMENT_DESCRIPTION: &str = "desc";

/// Descriptive metadata for one track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Track number as free text (e.g. "3" or "3/7")
    pub track_number: Option<String>,
    /// Written only when present
    pub comment: Option<String>,
}

impl TrackTags {
    pub fn new(title: impl Into<String>, artist: impl Into<String>, album: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            artist: Some(artist.into()),
            album: Some(album.into()),
            ..Self::default()
        }
    }

    pub fn with_track_number(mut self, track_number: impl ToString) -> Self {
        self.track_number = Some(track_number.to_string());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

fn text_frame(id: &'static str, value: Option<&str>) -> Frame<'static> {
    Frame::Text(TextInformationFrame::new(
        FrameId::Valid(Cow::Borrowed(id)),
        TextEncoding::UTF8,
        value.unwrap_or_default().to_string(),
    ))
}

/// Write `tags` into the MP3 at `path`
///
/// Existing frames written by the encoder are kept; the fields managed here
/// replace any previous values.
pub fn write_tags(path: &Path, tags: &TrackTags) -> Result<()> {
    let tag_err = |e: lofty::error::LoftyError| Error::tag(path.display().to_string(), e.to_string());

    let mut file = File::open(path)?;
    let mpeg = MpegFile::read_from(&mut file, ParseOptions::new()).map_err(tag_err)?;
    drop(file);

    let mut tag = mpeg.id3v2().cloned().unwrap_or_else(Id3v2Tag::new);
    debug!("Existing ID3v2 frames in {}: {}", path.display(), tag.len());

    tag.insert(text_frame("TIT2", tags.title.as_deref()));
    tag.insert(text_frame("TPE1", tags.artist.as_deref()));
    tag.insert(text_frame("TALB", tags.album.as_deref()));
    tag.insert(text_frame("TRCK", tags.track_number.as_deref()));

    if let Some(comment) = &tags.comment {
        tag.insert(Frame::Comment(CommentFrame::new(
            TextEncoding::UTF8,
            COMMENT_LANGUAGE,
            COMMENT_DESCRIPTION.to_string(),
            comment.clone(),
        )));
    }

    tag.save_to_path(path, WriteOptions::default())
        .map_err(tag_err)?;

    info!(
        "Tagged {}: '{}' by '{}'",
        path.display(),
        tags.title.as_deref().unwrap_or_default(),
        tags.artist.as_deref().unwrap_or_default()
    );

    Ok(())
}

/// Read back the fields managed by [`write_tags`]
///
/// Frames that are absent read as empty strings; the comment is `None` when
/// no comment frame with our language is present.
pub fn read_tags(path: &Path) -> Result<TrackTags> {
    let tag_err = |e: lofty::error::LoftyError| Error::tag(path.display().to_string(), e.to_string());

    let mut file = File::open(path)?;
    let mpeg = MpegFile::read_from(&mut file, ParseOptions::new()).map_err(tag_err)?;

    let Some(tag) = mpeg.id3v2() else {
        return Ok(TrackTags {
            title: Some(String::new()),
            artist: Some(String::new()),
            album: Some(String::new()),
            track_number: Some(String::new()),
            comment: None,
        });
    };

    let text = |id: &'static str| {
        Some(
            tag.get_text(&FrameId::Valid(Cow::Borrowed(id)))
                .unwrap_or_default()
                .to_string(),
        )
    };

    let comment = tag.into_iter().find_map(|frame| match frame {
        Frame::Comment(c) if c.language == COMMENT_LANGUAGE => Some(c.content.clone()),
        _ => None,
    });

    Ok(TrackTags {
        title: text("TIT2"),
        artist: text("TPE1"),
        album: text("TALB"),
        track_number: text("TRCK"),
        comment,
    })
}
