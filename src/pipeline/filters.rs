//! Filter chain construction
//!
//! Turns a preset plus a handful of numeric parameters into an ordered list of
//! processing stages. Order is fixed: preset shaping, then loudness
//! normalization, then the optional downmix.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

pub const DEFAULT_TARGET_LUFS: f64 = -18.0;
pub const DEFAULT_TRUE_PEAK_DBTP: f64 = -1.0;

/// Conversion preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Speech shaping: high-pass, presence boost, de-esser, gentle compression
    Speech,
    /// No shaping, normalization only
    Music,
}

impl Preset {
    /// Resolve a stored preset name
    ///
    /// Only `speech` selects shaping. Every other name, known or not, means
    /// "no shaping"; unknown names are tolerated with a warning.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "speech" => Self::Speech,
            "music" => Self::Music,
            other => {
                warn!("Unknown preset '{}', converting without preset shaping", other);
                Self::Music
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Speech => "speech",
            Self::Music => "music",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to the chain builder
#[derive(Debug, Clone, PartialEq)]
pub struct ChainParams {
    pub preset: Preset,
    /// Integrated loudness target in LUFS
    pub target_lufs: f64,
    /// True-peak ceiling in dBTP
    pub true_peak: f64,
    /// Downmix to a single channel
    pub mono: bool,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            preset: Preset::Speech,
            target_lufs: DEFAULT_TARGET_LUFS,
            true_peak: DEFAULT_TRUE_PEAK_DBTP,
            mono: true,
        }
    }
}

/// One named audio operation
#[derive(Debug, Clone, PartialEq)]
pub enum FilterStage {
    HighPass {
        frequency_hz: f64,
    },
    /// Peaking equalizer, width given as Q
    Equalizer {
        frequency_hz: f64,
        q: f64,
        gain_db: f64,
    },
    DeEsser,
    Compressor {
        ratio: f64,
        threshold_db: f64,
    },
    LoudnessNormalize {
        target_lufs: f64,
        true_peak: f64,
        dual_mono: bool,
    },
    /// Equal-weight stereo to mono
    Downmix,
}

impl FilterStage {
    /// Short stage name, stable across parameter changes
    pub fn name(&self) -> &'static str {
        match self {
            Self::HighPass { .. } => "highpass",
            Self::Equalizer { .. } => "equalizer",
            Self::DeEsser => "deesser",
            Self::Compressor { .. } => "acompressor",
            Self::LoudnessNormalize { .. } => "loudnorm",
            Self::Downmix => "pan",
        }
    }
}

/// Renders the stage as an ffmpeg filter expression
impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HighPass { frequency_hz } => write!(f, "highpass=f={}", frequency_hz),
            Self::Equalizer {
                frequency_hz,
                q,
                gain_db,
            } => write!(f, "equalizer=f={}:t=q:w={}:g={}", frequency_hz, q, gain_db),
            Self::DeEsser => f.write_str("deesser"),
            Self::Compressor {
                ratio,
                threshold_db,
            } => write!(f, "acompressor=ratio={}:threshold={}dB", ratio, threshold_db),
            Self::LoudnessNormalize {
                target_lufs,
                true_peak,
                dual_mono,
            } => write!(
                f,
                "loudnorm=I={}:TP={}:dual_mono={}",
                target_lufs, true_peak, dual_mono
            ),
            Self::Downmix => f.write_str("pan=mono|c0=.5*c0+.5*c1"),
        }
    }
}

/// Ordered stage list
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    stages: Vec<FilterStage>,
}

impl FilterChain {
    /// Build the chain for `params`; deterministic for equal inputs
    pub fn build(params: &ChainParams) -> Self {
        let mut stages = Vec::with_capacity(6);

        if params.preset == Preset::Speech {
            stages.push(FilterStage::HighPass { frequency_hz: 90.0 });
            stages.push(FilterStage::Equalizer {
                frequency_hz: 3000.0,
                q: 2.0,
                gain_db: 2.0,
            });
            stages.push(FilterStage::DeEsser);
            stages.push(FilterStage::Compressor {
                ratio: 2.0,
                threshold_db: -20.0,
            });
        }

        stages.push(FilterStage::LoudnessNormalize {
            target_lufs: params.target_lufs,
            true_peak: params.true_peak,
            dual_mono: true,
        });

        if params.mono {
            stages.push(FilterStage::Downmix);
        }

        Self { stages }
    }

    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    /// Comma-joined expression for ffmpeg's `-af`
    pub fn to_ffmpeg_expr(&self) -> String {
        self.stages
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}
