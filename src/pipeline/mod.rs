//! Conversion pipeline: filter chain → ffmpeg encode → ID3 tags → measurement

pub mod analysis;
pub mod converter;
pub mod encoder;
pub mod filters;
pub mod tagger;

pub use analysis::{measure_file, TrackMeasurement};
pub use converter::{ConvertedTrack, Converter};
pub use encoder::{EncodeRequest, Encoder, PcmInput, DEFAULT_BITRATE_K};
pub use filters::{ChainParams, FilterChain, FilterStage, Preset};
pub use tagger::{read_tags, write_tags, TrackTags};
