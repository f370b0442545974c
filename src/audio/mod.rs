pub mod format;
pub mod ingest;
pub mod segment;

pub use format::{PcmFormat, INPUT_FORMAT};
pub use ingest::{ensure_fifo, FifoSource, IngestEvent, PcmSource, READ_CHUNK_SIZE};
pub use segment::{RecordingSummary, SegmentConfig, SegmentMetadata, SegmentRecorder};
