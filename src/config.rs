use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub paths: PathsConfig,
    pub encoder: EncoderConfig,
    pub recording: RecordingConfig,
    #[serde(default)]
    pub spotify: SpotifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Named pipe the PCM producer writes into
    pub fifo: PathBuf,
    /// Directory for finished MP3 tracks
    pub output_dir: PathBuf,
    /// Directory for raw PCM segments waiting to be encoded
    pub spool_dir: PathBuf,
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncoderConfig {
    pub ffmpeg_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordingConfig {
    /// Length of one encoded track in seconds of source audio
    pub segment_secs: u64,
    /// Capacity of the ingest → segmenter channel (in 4 KiB chunks)
    pub channel_capacity: usize,
}

/// OAuth client registration; values stored in settings win over these
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

impl Config {
    /// Load configuration from `path` (extension optional, file optional)
    /// layered under `TONIE__*` environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = Self::builder()?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("TONIE").separator("__"))
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        Ok(settings.try_deserialize()?)
    }

    /// Built-in defaults only
    pub fn defaults() -> Result<Self> {
        Ok(Self::builder()?.build()?.try_deserialize()?)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(config::Config::builder()
            .set_default("service.name", "tonie-worker")?
            .set_default("service.http.bind", "0.0.0.0")?
            .set_default("service.http.port", 8080)?
            .set_default("paths.fifo", "/fifo/spotout")?
            .set_default("paths.output_dir", "/app/output")?
            .set_default("paths.spool_dir", "/app/spool")?
            .set_default("paths.database_url", "sqlite:///app/db/tonie.db")?
            .set_default("encoder.ffmpeg_path", "ffmpeg")?
            .set_default("recording.segment_secs", 600)?
            .set_default("recording.channel_capacity", 64)?)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.service.http.bind, self.service.http.port)
    }
}
