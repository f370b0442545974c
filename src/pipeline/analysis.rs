//! Post-encode measurement
//!
//! Decodes a finished track and measures it per EBU R128:
//! - Integrated loudness (LUFS)
//! - True peak (dBTP, 4x oversampled)
//! - Duration

use crate::error::{Error, Result};
use ebur128::{EbuR128, Mode};
use serde::Serialize;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

/// Loudness characteristics of an encoded track
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackMeasurement {
    pub duration_secs: f64,
    /// Integrated loudness; `None` for silence (below the absolute gate)
    pub integrated_lufs: Option<f64>,
    /// Maximum true peak over all channels; `None` for digital silence
    pub true_peak_dbtp: Option<f64>,
    pub sample_rate: u32,
    pub channels: u32,
}

/// Decode `path` and measure it
pub fn measure_file(path: &Path) -> Result<TrackMeasurement> {
    let analysis_err = |e: SymphoniaError| Error::Analysis(format!("{}: {}", path.display(), e));

    let src = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(analysis_err)?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| Error::Analysis(format!("{}: no audio track", path.display())))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| Error::Analysis(format!("{}: unknown sample rate", path.display())))?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u32)
        .ok_or_else(|| Error::Analysis(format!("{}: unknown channel count", path.display())))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(analysis_err)?;

    let mut meter = EbuR128::new(channels, sample_rate, Mode::I | Mode::TRUE_PEAK)
        .map_err(|e| Error::Analysis(format!("{:?}", e)))?;
    let mut frames: u64 = 0;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(analysis_err(e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);

                let samples = buf.samples();
                meter
                    .add_frames_f32(samples)
                    .map_err(|e| Error::Analysis(format!("{:?}", e)))?;
                frames += (samples.len() / channels as usize) as u64;
            }
            // Skip corrupt frames; the rest of the file is still measurable
            Err(SymphoniaError::DecodeError(e)) => debug!("Skipping undecodable packet: {}", e),
            Err(e) => return Err(analysis_err(e)),
        }
    }

    let integrated = meter
        .loudness_global()
        .map_err(|e| Error::Analysis(format!("{:?}", e)))?;

    let mut peak_linear = 0.0_f64;
    for ch in 0..channels {
        let p = meter
            .true_peak(ch)
            .map_err(|e| Error::Analysis(format!("{:?}", e)))?;
        peak_linear = peak_linear.max(p);
    }

    let measurement = TrackMeasurement {
        duration_secs: frames as f64 / sample_rate as f64,
        integrated_lufs: integrated.is_finite().then_some(integrated),
        true_peak_dbtp: (peak_linear > 0.0).then(|| 20.0 * peak_linear.log10()),
        sample_rate,
        channels,
    };

    info!(
        "Measured {}: {:.1}s, {} LUFS, {} dBTP",
        path.display(),
        measurement.duration_secs,
        fmt_db(measurement.integrated_lufs),
        fmt_db(measurement.true_peak_dbtp)
    );

    Ok(measurement)
}

fn fmt_db(value: Option<f64>) -> String {
    value.map_or_else(|| "-inf".to_string(), |v| format!("{:.1}", v))
}
