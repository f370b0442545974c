pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod session;
pub mod store;

pub use audio::{
    FifoSource, IngestEvent, PcmFormat, PcmSource, SegmentConfig, SegmentMetadata,
    SegmentRecorder, INPUT_FORMAT,
};
pub use config::Config;
pub use error::{Error, Result};
pub use http::{create_router, AppState};
pub use pipeline::{
    ChainParams, ConvertedTrack, Converter, Encoder, FilterChain, FilterStage, PcmInput, Preset,
    TrackTags,
};
pub use session::{RecordingSession, SessionConfig, SessionStats};
pub use store::{ConversionSettings, EventLevel, NewTrack, Session, Store, Track};
