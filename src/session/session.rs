use super::config::SessionConfig;
use super::stats::SessionStats;
use crate::audio::{
    ensure_fifo, FifoSource, PcmSource, SegmentConfig, SegmentMetadata, SegmentRecorder,
    INPUT_FORMAT,
};
use crate::error::{Error, Result};
use crate::pipeline::{ConvertedTrack, Converter, PcmInput, TrackTags};
use crate::store::{ConversionSettings, EventLevel, NewTrack, Store};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A recording session: FIFO ingest → segments → converted tracks → store
pub struct RecordingSession {
    /// Store id of the session row
    id: i64,

    /// Session configuration
    config: SessionConfig,

    /// Settings snapshot taken at start
    settings: ConversionSettings,

    store: Store,

    /// When the session started
    started_at: chrono::DateTime<chrono::Utc>,

    /// Whether recording is currently active
    is_recording: Arc<AtomicBool>,

    /// Number of tracks stored
    tracks_converted: Arc<AtomicUsize>,

    /// Number of segments that failed to convert
    tracks_failed: Arc<AtomicUsize>,

    /// Track currently being encoded
    current: Arc<Mutex<Option<String>>>,

    /// PCM source
    source: Mutex<FifoSource>,

    /// Cancels the segment recorder
    stop_token: CancellationToken,

    /// Handle for the segment recording task
    record_task_handle: Mutex<Option<JoinHandle<()>>>,

    /// Handle for the conversion task
    convert_task_handle: Mutex<Option<JoinHandle<()>>>,
}

/// Per-track context shared by the conversion task
#[derive(Clone)]
struct TrackContext {
    session_id: i64,
    name: String,
    artist: String,
    output_dir: PathBuf,
    settings: ConversionSettings,
}

impl RecordingSession {
    /// Create the session row and start recording
    ///
    /// If anything fails after the row exists, the pipe reader is stopped and
    /// the row is closed before the error is returned.
    pub async fn start(store: Store, converter: Converter, config: SessionConfig) -> Result<Self> {
        let settings = ConversionSettings::load(&store).await?;

        // Fail before touching the store if the pipe or spool cannot be set up
        ensure_fifo(&config.fifo_path)?;
        tokio::fs::create_dir_all(&config.spool_dir).await?;

        let id = store
            .start_session(&config.name, &config.artist, &settings.preset, config.tonie_index)
            .await?;

        let segment_config = SegmentConfig {
            segment_secs: config.segment_secs,
            max_total_secs: Some(u64::from(settings.max_tonie_min) * 60),
            spool_dir: config.spool_dir.clone(),
            label: format!("session-{}", id),
            format: INPUT_FORMAT,
        };
        let mut recorder = match SegmentRecorder::new(segment_config) {
            Ok(recorder) => recorder,
            Err(e) => return Err(abort_start(&store, id, None, e).await),
        };

        let mut source = FifoSource::new(&config.fifo_path, config.channel_capacity);
        let pcm_rx = match source.start().await {
            Ok(rx) => rx,
            Err(e) => return Err(abort_start(&store, id, Some(&mut source), e).await),
        };

        if let Err(e) = store
            .log_event(
                EventLevel::Info,
                &format!("Recording started: {}", config.name),
                Some(id),
                None,
            )
            .await
        {
            return Err(abort_start(&store, id, Some(&mut source), e).await);
        }

        info!("Starting recording session {}: {}", id, config.name);

        let session = Self {
            id,
            settings: settings.clone(),
            store: store.clone(),
            started_at: Utc::now(),
            is_recording: Arc::new(AtomicBool::new(true)),
            tracks_converted: Arc::new(AtomicUsize::new(0)),
            tracks_failed: Arc::new(AtomicUsize::new(0)),
            current: Arc::new(Mutex::new(None)),
            source: Mutex::new(source),
            stop_token: CancellationToken::new(),
            record_task_handle: Mutex::new(None),
            convert_task_handle: Mutex::new(None),
            config,
        };

        let (segments_tx, segments_rx) = mpsc::channel(8);

        // Spawn segment recording task
        let stop = session.stop_token.clone();
        let record_store = store.clone();

        let record_task = tokio::spawn(async move {
            info!("Segment recording task started");

            match recorder.record(pcm_rx, segments_tx, stop).await {
                Ok(summary) => {
                    if summary.bytes_discarded > 0 {
                        let msg = format!(
                            "Session limit reached, {} bytes of audio discarded",
                            summary.bytes_discarded
                        );
                        log_event_or_warn(&record_store, EventLevel::Warn, &msg, Some(id), None).await;
                    }
                }
                Err(e) => {
                    error!("Recording failed: {}", e);
                    log_event_or_warn(&record_store, EventLevel::Error, &e.to_string(), Some(id), None)
                        .await;
                }
            }

            info!("Segment recording task stopped");
        });

        *session.record_task_handle.lock().await = Some(record_task);

        // Spawn conversion task
        let ctx = TrackContext {
            session_id: id,
            name: session.config.name.clone(),
            artist: session.config.artist.clone(),
            output_dir: session.config.output_dir.join(format!("session-{}", id)),
            settings,
        };
        let convert_task = tokio::spawn(Self::convert_segments(
            segments_rx,
            converter,
            store,
            ctx,
            Arc::clone(&session.tracks_converted),
            Arc::clone(&session.tracks_failed),
            Arc::clone(&session.current),
        ));

        *session.convert_task_handle.lock().await = Some(convert_task);

        info!("Recording session {} started successfully", id);

        Ok(session)
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn settings(&self) -> &ConversionSettings {
        &self.settings
    }

    /// Stop recording, convert what is left and close the session row
    pub async fn stop(&self) -> Result<SessionStats> {
        if !self.is_recording.swap(false, Ordering::SeqCst) {
            warn!("Recording not active");
            return Ok(self.get_stats().await);
        }

        info!("Stopping recording session: {}", self.id);

        self.source.lock().await.stop().await?;
        self.stop_token.cancel();

        // Wait for the recorder; its segment sender drops with it
        if let Some(task) = self.record_task_handle.lock().await.take() {
            if let Err(e) = task.await {
                error!("Segment recording task panicked: {}", e);
            }
        }

        // Wait for the remaining segments to be converted
        if let Some(task) = self.convert_task_handle.lock().await.take() {
            if let Err(e) = task.await {
                error!("Conversion task panicked: {}", e);
            }
        }

        self.store.end_session(self.id).await?;
        log_event_or_warn(
            &self.store,
            EventLevel::Info,
            &format!(
                "Recording ended: {} tracks",
                self.tracks_converted.load(Ordering::SeqCst)
            ),
            Some(self.id),
            None,
        )
        .await;

        info!("Recording session {} stopped successfully", self.id);

        Ok(self.get_stats().await)
    }

    /// Get current session statistics
    pub async fn get_stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            session_id: self.id,
            is_recording: self.is_recording.load(Ordering::SeqCst),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            tracks_converted: self.tracks_converted.load(Ordering::SeqCst),
            tracks_failed: self.tracks_failed.load(Ordering::SeqCst),
            current: self.current.lock().await.clone(),
        }
    }

    async fn convert_segments(
        mut segments_rx: mpsc::Receiver<SegmentMetadata>,
        converter: Converter,
        store: Store,
        ctx: TrackContext,
        tracks_converted: Arc<AtomicUsize>,
        tracks_failed: Arc<AtomicUsize>,
        current: Arc<Mutex<Option<String>>>,
    ) {
        info!("Conversion task started");

        while let Some(segment) = segments_rx.recv().await {
            let idx = match store.next_track_index(ctx.session_id).await {
                Ok(idx) => idx,
                Err(e) => {
                    error!("Failed to allocate track index: {}", e);
                    tracks_failed.fetch_add(1, Ordering::SeqCst);
                    continue;
                }
            };

            let output = ctx.output_dir.join(track_file_name(idx));
            *current.lock().await = Some(output.display().to_string());

            let tags = TrackTags::new(
                format!("{} - Teil {}", ctx.name, idx + 1),
                ctx.artist.clone(),
                ctx.name.clone(),
            )
            .with_track_number(idx + 1);

            let result = convert_and_record(
                &converter,
                &store,
                ctx.session_id,
                idx,
                PcmInput::File(segment.file_path.clone()),
                output,
                tags,
                &ctx.settings,
            )
            .await;

            *current.lock().await = None;

            match result {
                Ok(_) => {
                    tracks_converted.fetch_add(1, Ordering::SeqCst);
                    remove_spooled(&segment.file_path).await;
                }
                Err(e) => {
                    // Keep the raw segment so the track can be re-attempted
                    error!("Segment {} failed: {}", segment.index, e);
                    tracks_failed.fetch_add(1, Ordering::SeqCst);
                    log_event_or_warn(
                        &store,
                        EventLevel::Error,
                        &format!("Track {} failed: {}", idx, e),
                        Some(ctx.session_id),
                        None,
                    )
                    .await;
                }
            }
        }

        info!("Conversion task stopped");
    }
}

/// `01.mp3`, `02.mp3`, ...
pub fn track_file_name(idx: i64) -> String {
    format!("{:02}.mp3", idx + 1)
}

/// Convert one input and insert its track row once the file is complete
#[allow(clippy::too_many_arguments)]
pub async fn convert_and_record(
    converter: &Converter,
    store: &Store,
    session_id: i64,
    idx: i64,
    input: PcmInput,
    output: PathBuf,
    tags: TrackTags,
    settings: &ConversionSettings,
) -> Result<(i64, ConvertedTrack)> {
    let converted = converter.convert(input, output, tags, settings).await?;

    let track = NewTrack {
        session_id,
        idx,
        title: converted.tags.title.clone().unwrap_or_default(),
        artist: converted.tags.artist.clone().unwrap_or_default(),
        album: converted.tags.album.clone().unwrap_or_default(),
        duration_s: converted.measurement.duration_secs.round() as i64,
        lufs: converted.measurement.integrated_lufs,
        true_peak: converted.measurement.true_peak_dbtp,
        path: converted.path.display().to_string(),
    };
    let track_id = store.add_track(&track).await?;

    log_event_or_warn(
        store,
        EventLevel::Info,
        &format!("Track {} encoded: {}", idx, track.path),
        Some(session_id),
        Some(track_id),
    )
    .await;

    Ok((track_id, converted))
}

/// One-shot conversion of a raw PCM file into a single-track session
pub async fn convert_file(
    store: &Store,
    converter: &Converter,
    input: &Path,
    output: PathBuf,
    tags: TrackTags,
    tonie_index: i64,
) -> Result<(i64, i64)> {
    let settings = ConversionSettings::load(store).await?;
    let session_id = store
        .start_session(
            tags.album.as_deref().unwrap_or_default(),
            tags.artist.as_deref().unwrap_or_default(),
            &settings.preset,
            tonie_index,
        )
        .await?;

    let result = convert_and_record(
        converter,
        store,
        session_id,
        0,
        PcmInput::File(input.to_path_buf()),
        output,
        tags,
        &settings,
    )
    .await;

    if let Err(e) = &result {
        log_event_or_warn(
            store,
            EventLevel::Error,
            &format!("Conversion of {} failed: {}", input.display(), e),
            Some(session_id),
            None,
        )
        .await;
    }

    store.end_session(session_id).await?;
    let (track_id, _) = result?;

    Ok((session_id, track_id))
}

/// Undo a half-started session: stop the reader and close the row
async fn abort_start(
    store: &Store,
    id: i64,
    source: Option<&mut FifoSource>,
    err: Error,
) -> Error {
    error!("Failed to start session {}: {}", id, err);

    if let Some(source) = source {
        if let Err(e) = source.stop().await {
            warn!("Failed to stop PCM ingest: {}", e);
        }
    }
    if let Err(e) = store.end_session(id).await {
        warn!("Failed to close session {}: {}", id, e);
    }
    log_event_or_warn(store, EventLevel::Error, &err.to_string(), Some(id), None).await;

    err
}

async fn log_event_or_warn(
    store: &Store,
    level: EventLevel,
    msg: &str,
    session_id: Option<i64>,
    track_id: Option<i64>,
) {
    if let Err(e) = store.log_event(level, msg, session_id, track_id).await {
        warn!("Failed to record event '{}': {}", msg, e);
    }
}

async fn remove_spooled(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Failed to remove spooled segment {}: {}", path.display(), e);
    }
}
