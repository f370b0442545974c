// PCM ingest from a named pipe
//
// The read loop runs on a dedicated OS thread because reads from a FIFO block.
// Chunks go to the consumer over a bounded channel; when the channel is full the
// reader waits, which in turn lets the OS pipe buffer apply backpressure to the
// producer.
//
// Stop latency: `stop()` cancels a token that the loop checks between reads. A
// read that is already blocked is not interrupted, so the loop exits only once
// at least one more byte arrives or the read call returns (e.g. all writers
// closed the pipe). Opening the pipe also blocks until a writer appears.

use crate::error::{Error, Result};
use std::ffi::CString;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Maximum bytes requested per read
pub const READ_CHUNK_SIZE: usize = 4096;

/// Pause after a zero-byte read (no writer attached) before reading again
const IDLE_BACKOFF: Duration = Duration::from_millis(20);

/// Items delivered by a running ingest loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    /// Raw PCM bytes in arrival order, at most `READ_CHUNK_SIZE` long
    Chunk(Vec<u8>),
    /// The loop hit an error after `start()` returned; the channel closes next
    Failed(String),
}

/// Source of raw PCM chunks
#[async_trait::async_trait]
pub trait PcmSource: Send + Sync {
    /// Start reading in the background
    ///
    /// Returns a channel receiver that will receive chunks in order. The
    /// channel closes once the loop exits.
    async fn start(&mut self) -> Result<mpsc::Receiver<IngestEvent>>;

    /// Ask the read loop to exit after its current read
    async fn stop(&mut self) -> Result<()>;

    /// Check if the loop is currently running
    fn is_capturing(&self) -> bool;

    /// Get source name for logging
    fn name(&self) -> &str;
}

/// Reads a FIFO, creating it on demand
pub struct FifoSource {
    path: PathBuf,
    channel_capacity: usize,
    cancel: Option<CancellationToken>,
    worker: Option<JoinHandle<()>>,
}

impl FifoSource {
    pub fn new(path: impl Into<PathBuf>, channel_capacity: usize) -> Self {
        Self {
            path: path.into(),
            channel_capacity: channel_capacity.max(1),
            cancel: None,
            worker: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl PcmSource for FifoSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<IngestEvent>> {
        if self.is_capturing() {
            return Err(Error::Ingest(format!(
                "{} is already being read",
                self.path.display()
            )));
        }

        ensure_fifo(&self.path)?;

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let cancel = CancellationToken::new();
        let path = self.path.clone();
        let loop_cancel = cancel.clone();

        let worker = std::thread::Builder::new()
            .name("pcm-ingest".to_string())
            .spawn(move || read_loop(&path, &tx, &loop_cancel))?;

        info!("PCM ingest started on {}", self.path.display());

        self.cancel = Some(cancel);
        self.worker = Some(worker);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(cancel) = self.cancel.take() {
            info!("Stopping PCM ingest on {}", self.path.display());
            cancel.cancel();
        }

        // Detach: joining here would block until the pending read returns
        self.worker.take();

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    fn name(&self) -> &str {
        "fifo"
    }
}

/// Create the FIFO at `path` unless one already exists there
pub fn ensure_fifo(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.file_type().is_fifo() => {
            debug!("Reusing existing FIFO at {}", path.display());
            return Ok(());
        }
        Ok(_) => {
            return Err(Error::stream_setup(
                path.display().to_string(),
                "path exists and is not a FIFO",
            ))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(Error::stream_setup(path.display().to_string(), e.to_string())),
    }

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| Error::stream_setup(path.display().to_string(), e.to_string()))?;

    // SAFETY: c_path is a valid NUL-terminated string that outlives the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o666) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        return Err(Error::stream_setup(path.display().to_string(), err.to_string()));
    }

    info!("Created FIFO at {}", path.display());
    Ok(())
}

fn read_loop(path: &Path, tx: &mpsc::Sender<IngestEvent>, cancel: &CancellationToken) {
    let mut fifo = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            error!("Failed to open FIFO {}: {}", path.display(), e);
            let _ = tx.blocking_send(IngestEvent::Failed(format!(
                "failed to open {}: {}",
                path.display(),
                e
            )));
            return;
        }
    };

    info!("FIFO opened, reading PCM from {}", path.display());

    let mut buf = [0u8; READ_CHUNK_SIZE];
    let mut total: u64 = 0;

    while !cancel.is_cancelled() {
        match fifo.read(&mut buf) {
            // No writer attached right now; this is a live stream, keep going
            Ok(0) => std::thread::sleep(IDLE_BACKOFF),
            Ok(n) => {
                total += n as u64;
                if tx.blocking_send(IngestEvent::Chunk(buf[..n].to_vec())).is_err() {
                    warn!("PCM consumer went away, ending ingest");
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                error!("Read from FIFO failed: {}", e);
                let _ = tx.blocking_send(IngestEvent::Failed(e.to_string()));
                break;
            }
        }
    }

    info!("PCM ingest loop stopped after {} bytes", total);
}
