use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::format::{PcmFormat, INPUT_FORMAT};
use super::ingest::IngestEvent;
use crate::error::{Error, Result};

/// Segment configuration
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// Seconds of source audio per segment (default: 600 = 10 minutes)
    pub segment_secs: u64,
    /// Upper bound on audio accepted for the whole session, `None` for unlimited
    pub max_total_secs: Option<u64>,
    /// Spool directory for raw segments
    pub spool_dir: PathBuf,
    /// Prefix used for segment filenames
    pub label: String,
    pub format: PcmFormat,
}

impl SegmentConfig {
    pub fn new(label: String, spool_dir: PathBuf) -> Self {
        Self {
            segment_secs: 600,
            max_total_secs: None,
            spool_dir,
            label,
            format: INPUT_FORMAT,
        }
    }
}

/// A finished raw PCM segment waiting to be encoded
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMetadata {
    /// Segment number (0-indexed)
    pub index: usize,
    pub file_path: PathBuf,
    pub byte_count: u64,
    pub duration_secs: f64,
}

/// What a finished recording produced
#[derive(Debug, Clone, Default)]
pub struct RecordingSummary {
    pub segments: usize,
    pub bytes_accepted: u64,
    pub bytes_discarded: u64,
}

/// Spools ingested PCM into fixed-length raw segment files
///
/// Each finished segment is handed on through `segments_tx` as soon as it is
/// closed, so encoding can start while recording continues.
pub struct SegmentRecorder {
    config: SegmentConfig,
    current: Option<SegmentWriter>,
    next_index: usize,
    summary: RecordingSummary,
}

impl SegmentRecorder {
    pub fn new(config: SegmentConfig) -> Result<Self> {
        fs::create_dir_all(&config.spool_dir)?;

        info!(
            "Segment recorder initialized: {} (segments: {}s each)",
            config.label, config.segment_secs
        );

        Ok(Self {
            config,
            current: None,
            next_index: 0,
            summary: RecordingSummary::default(),
        })
    }

    /// Consume ingest events until the channel closes or `stop` is cancelled
    ///
    /// On cancellation, chunks already queued in the channel are still written.
    /// An in-band ingest failure closes the open segment and is returned as
    /// `Error::Ingest`.
    pub async fn record(
        &mut self,
        mut pcm_rx: mpsc::Receiver<IngestEvent>,
        segments_tx: mpsc::Sender<SegmentMetadata>,
        stop: CancellationToken,
    ) -> Result<RecordingSummary> {
        info!("Starting segmented recording");

        let mut failure = None;

        loop {
            let event = tokio::select! {
                event = pcm_rx.recv() => event,
                _ = stop.cancelled() => break,
            };

            match event {
                Some(IngestEvent::Chunk(bytes)) => self.write(&bytes, &segments_tx).await?,
                Some(IngestEvent::Failed(reason)) => {
                    failure = Some(reason);
                    break;
                }
                None => break,
            }
        }

        // Drain what was already delivered before the stop
        if failure.is_none() {
            while let Ok(event) = pcm_rx.try_recv() {
                match event {
                    IngestEvent::Chunk(bytes) => self.write(&bytes, &segments_tx).await?,
                    IngestEvent::Failed(reason) => {
                        failure = Some(reason);
                        break;
                    }
                }
            }
        }

        self.finish_current(&segments_tx).await?;

        info!(
            "Segmented recording complete: {} segments, {} bytes ({} discarded)",
            self.summary.segments, self.summary.bytes_accepted, self.summary.bytes_discarded
        );

        match failure {
            Some(reason) => Err(Error::Ingest(reason)),
            None => Ok(self.summary.clone()),
        }
    }

    async fn write(&mut self, mut bytes: &[u8], segments_tx: &mpsc::Sender<SegmentMetadata>) -> Result<()> {
        let remaining_budget = self.remaining_budget();
        if (bytes.len() as u64) > remaining_budget {
            let keep = remaining_budget as usize;
            if self.summary.bytes_discarded == 0 {
                warn!(
                    "Session limit of {} minutes reached, discarding further audio",
                    self.config.max_total_secs.unwrap_or_default() / 60
                );
            }
            self.summary.bytes_discarded += (bytes.len() - keep) as u64;
            bytes = &bytes[..keep];
        }

        let segment_bytes = self.config.format.bytes_for_secs(self.config.segment_secs.max(1));

        while !bytes.is_empty() {
            if self.current.is_none() {
                self.current = Some(self.start_segment()?);
            }

            let Some(writer) = self.current.as_mut() else {
                break;
            };
            let room = (segment_bytes - writer.byte_count) as usize;
            let take = room.min(bytes.len());

            writer.write(&bytes[..take])?;
            self.summary.bytes_accepted += take as u64;
            bytes = &bytes[take..];

            if writer.byte_count >= segment_bytes {
                self.finish_current(segments_tx).await?;
            }
        }

        Ok(())
    }

    fn remaining_budget(&self) -> u64 {
        match self.config.max_total_secs {
            Some(secs) => self
                .config
                .format
                .bytes_for_secs(secs)
                .saturating_sub(self.summary.bytes_accepted),
            None => u64::MAX,
        }
    }

    fn start_segment(&mut self) -> Result<SegmentWriter> {
        let path = self.config.spool_dir.join(format!(
            "{}-seg-{:03}.pcm",
            self.config.label, self.next_index
        ));

        let writer = SegmentWriter::create(path, self.next_index)?;
        self.next_index += 1;

        Ok(writer)
    }

    async fn finish_current(&mut self, segments_tx: &mpsc::Sender<SegmentMetadata>) -> Result<()> {
        let Some(writer) = self.current.take() else {
            return Ok(());
        };

        let metadata = writer.finish(&self.config.format)?;
        info!(
            "Segment {} complete: {:.1}s ({} bytes)",
            metadata.index, metadata.duration_secs, metadata.byte_count
        );

        self.summary.segments += 1;
        if segments_tx.send(metadata).await.is_err() {
            warn!("Segment consumer went away, segment left in spool");
        }

        Ok(())
    }
}

/// Writes one raw segment to disk
struct SegmentWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    index: usize,
    byte_count: u64,
}

impl SegmentWriter {
    fn create(path: PathBuf, index: usize) -> Result<Self> {
        let file = File::create(&path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            index,
            byte_count: 0,
        })
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.byte_count += bytes.len() as u64;
        Ok(())
    }

    fn finish(mut self, format: &PcmFormat) -> Result<SegmentMetadata> {
        self.writer.flush()?;

        Ok(SegmentMetadata {
            index: self.index,
            file_path: self.path,
            byte_count: self.byte_count,
            duration_secs: format.duration_secs(self.byte_count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir, segment_secs: u64, max_total_secs: Option<u64>) -> SegmentConfig {
        SegmentConfig {
            segment_secs,
            max_total_secs,
            spool_dir: dir.path().to_path_buf(),
            label: "test".to_string(),
            format: INPUT_FORMAT,
        }
    }

    #[tokio::test]
    async fn splits_at_exact_segment_boundaries() {
        let dir = TempDir::new().unwrap();
        let mut recorder = SegmentRecorder::new(config(&dir, 1, None)).unwrap();

        let (pcm_tx, pcm_rx) = mpsc::channel(16);
        let (seg_tx, mut seg_rx) = mpsc::channel(16);

        // 2.5 seconds in 4 KiB chunks
        let total = INPUT_FORMAT.bytes_per_second() as usize * 5 / 2;
        let data: Vec<u8> = (0..total).map(|i| (i % 251) as u8).collect();
        let feeder = {
            let data = data.clone();
            tokio::spawn(async move {
                for chunk in data.chunks(4096) {
                    pcm_tx.send(IngestEvent::Chunk(chunk.to_vec())).await.unwrap();
                }
            })
        };

        let summary = recorder
            .record(pcm_rx, seg_tx, CancellationToken::new())
            .await
            .unwrap();
        feeder.await.unwrap();

        assert_eq!(summary.segments, 3);
        assert_eq!(summary.bytes_accepted, total as u64);

        let mut joined = Vec::new();
        let mut sizes = Vec::new();
        while let Ok(seg) = seg_rx.try_recv() {
            sizes.push(seg.byte_count);
            joined.extend(std::fs::read(&seg.file_path).unwrap());
        }
        assert_eq!(sizes, vec![176_400, 176_400, 88_200]);
        assert_eq!(joined, data);
    }

    #[tokio::test]
    async fn discards_audio_beyond_session_limit() {
        let dir = TempDir::new().unwrap();
        let mut recorder = SegmentRecorder::new(config(&dir, 600, Some(1))).unwrap();

        let (pcm_tx, pcm_rx) = mpsc::channel(8);
        let (seg_tx, mut seg_rx) = mpsc::channel(8);

        let one_sec = INPUT_FORMAT.bytes_per_second() as usize;
        pcm_tx.send(IngestEvent::Chunk(vec![0; one_sec])).await.unwrap();
        pcm_tx.send(IngestEvent::Chunk(vec![0; 1000])).await.unwrap();
        drop(pcm_tx);

        let summary = recorder
            .record(pcm_rx, seg_tx, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.bytes_accepted, one_sec as u64);
        assert_eq!(summary.bytes_discarded, 1000);
        assert_eq!(seg_rx.try_recv().unwrap().byte_count, one_sec as u64);
    }

    #[tokio::test]
    async fn ingest_failure_closes_segment_and_reports() {
        let dir = TempDir::new().unwrap();
        let mut recorder = SegmentRecorder::new(config(&dir, 600, None)).unwrap();

        let (pcm_tx, pcm_rx) = mpsc::channel(8);
        let (seg_tx, mut seg_rx) = mpsc::channel(8);

        pcm_tx.send(IngestEvent::Chunk(vec![1; 400])).await.unwrap();
        pcm_tx
            .send(IngestEvent::Failed("pipe vanished".to_string()))
            .await
            .unwrap();

        let err = recorder
            .record(pcm_rx, seg_tx, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Ingest(ref msg) if msg == "pipe vanished"));
        assert_eq!(seg_rx.try_recv().unwrap().byte_count, 400);
    }
}
