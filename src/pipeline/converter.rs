use crate::error::Result;
use crate::store::ConversionSettings;
use std::path::PathBuf;
use tracing::{error, info};

use super::analysis::{measure_file, TrackMeasurement};
use super::encoder::{discard_output, EncodeRequest, Encoder, PcmInput};
use super::filters::{ChainParams, FilterChain, Preset};
use super::tagger::{write_tags, TrackTags};

/// A finished, tagged and measured track on disk
#[derive(Debug, Clone)]
pub struct ConvertedTrack {
    pub path: PathBuf,
    pub tags: TrackTags,
    pub measurement: TrackMeasurement,
}

/// Encode → tag → measure for one track
#[derive(Debug, Clone)]
pub struct Converter {
    encoder: Encoder,
}

impl Converter {
    pub fn new(encoder: Encoder) -> Self {
        Self { encoder }
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    /// Chain parameters derived from the stored settings
    pub fn chain_params(settings: &ConversionSettings) -> ChainParams {
        ChainParams {
            preset: Preset::from_name(&settings.preset),
            target_lufs: settings.target_lufs,
            true_peak: settings.true_peak,
            mono: settings.mono,
        }
    }

    /// Convert one input into a tagged MP3 at `output`
    ///
    /// A tag failure deletes the freshly encoded file before returning, so a
    /// file at `output` always means a complete, tagged track.
    pub async fn convert(
        &self,
        input: PcmInput,
        output: PathBuf,
        tags: TrackTags,
        settings: &ConversionSettings,
    ) -> Result<ConvertedTrack> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let req = EncodeRequest {
            input,
            output: output.clone(),
            chain: FilterChain::build(&Self::chain_params(settings)),
            bitrate_k: settings.bitrate_k,
            mono: settings.mono,
        };

        self.encoder.encode(&req).await?;

        let tag_path = output.clone();
        let tag_values = tags.clone();
        let tagged = tokio::task::spawn_blocking(move || write_tags(&tag_path, &tag_values))
            .await
            .map_err(|e| crate::Error::tag(output.display().to_string(), e.to_string()))
            .and_then(|r| r);

        if let Err(e) = tagged {
            error!("Tagging failed, discarding {}: {}", output.display(), e);
            discard_output(&output).await;
            return Err(e);
        }

        let measure_path = output.clone();
        let measurement = tokio::task::spawn_blocking(move || measure_file(&measure_path))
            .await
            .map_err(|e| crate::Error::Analysis(e.to_string()))??;

        info!("Track ready: {}", output.display());

        Ok(ConvertedTrack {
            path: output,
            tags,
            measurement,
        })
    }
}
