//! Conversion settings
//!
//! Settings are stored as plain strings under a fixed vocabulary of keys.
//! Readers parse them with documented defaults; unknown keys are kept in the
//! table but ignored, and unparsable values fall back to the default.

use super::Store;
use crate::error::Result;
use crate::pipeline::encoder::DEFAULT_BITRATE_K;
use crate::pipeline::filters::{DEFAULT_TARGET_LUFS, DEFAULT_TRUE_PEAK_DBTP};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::warn;

// Setting key constants
/// Conversion preset name (`speech`, `music`)
pub const SETTING_PRESET: &str = "preset";

/// Integrated loudness target in LUFS
pub const SETTING_TARGET_LUFS: &str = "target_lufs";

/// True-peak ceiling in dBTP
pub const SETTING_TRUE_PEAK: &str = "true_peak";

/// MP3 bitrate in kbps
pub const SETTING_BITRATE_K: &str = "bitrate_k";

/// Downmix to mono
pub const SETTING_MONO: &str = "mono";

/// Maximum audio per session in minutes (device capacity)
pub const SETTING_MAX_TONIE_MIN: &str = "max_tonie_min";

/// Serve `/metrics`
pub const SETTING_METRICS_ENABLED: &str = "metrics_enabled";

pub const SETTING_SPOTIFY_CLIENT_ID: &str = "spotify_client_id";
pub const SETTING_SPOTIFY_CLIENT_SECRET: &str = "spotify_client_secret";
pub const SETTING_SPOTIFY_REDIRECT_URI: &str = "spotify_redirect_uri";

/// Parse the boolean spellings found in stored settings
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Effective conversion configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionSettings {
    pub preset: String,
    pub target_lufs: f64,
    pub true_peak: f64,
    pub bitrate_k: u32,
    pub mono: bool,
    pub max_tonie_min: u32,
    pub metrics_enabled: bool,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            preset: "speech".to_string(),
            target_lufs: DEFAULT_TARGET_LUFS,
            true_peak: DEFAULT_TRUE_PEAK_DBTP,
            bitrate_k: DEFAULT_BITRATE_K,
            mono: true,
            max_tonie_min: 90,
            metrics_enabled: false,
        }
    }
}

fn parsed_or<T: FromStr>(values: &HashMap<String, String>, key: &str, default: T) -> T {
    match values.get(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparsable setting {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

fn bool_or(values: &HashMap<String, String>, key: &str, default: bool) -> bool {
    match values.get(key) {
        Some(raw) => parse_bool(raw).unwrap_or_else(|| {
            warn!("Ignoring unparsable setting {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

impl ConversionSettings {
    /// Build from raw key/value pairs
    pub fn from_values(values: &HashMap<String, String>) -> Self {
        let defaults = Self::default();

        Self {
            preset: values
                .get(SETTING_PRESET)
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .unwrap_or(defaults.preset),
            target_lufs: parsed_or(values, SETTING_TARGET_LUFS, defaults.target_lufs),
            true_peak: parsed_or(values, SETTING_TRUE_PEAK, defaults.true_peak),
            bitrate_k: parsed_or(values, SETTING_BITRATE_K, defaults.bitrate_k),
            mono: bool_or(values, SETTING_MONO, defaults.mono),
            max_tonie_min: parsed_or(values, SETTING_MAX_TONIE_MIN, defaults.max_tonie_min),
            metrics_enabled: bool_or(values, SETTING_METRICS_ENABLED, defaults.metrics_enabled),
        }
    }

    pub async fn load(store: &Store) -> Result<Self> {
        Ok(Self::from_values(&store.all_settings().await?))
    }
}

/// Third-party credentials held in settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegrationSettings {
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub spotify_redirect_uri: Option<String>,
}

impl IntegrationSettings {
    pub async fn load(store: &Store) -> Result<Self> {
        let values = store.all_settings().await?;
        let non_empty = |key: &str| {
            values
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            spotify_client_id: non_empty(SETTING_SPOTIFY_CLIENT_ID),
            spotify_client_secret: non_empty(SETTING_SPOTIFY_CLIENT_SECRET),
            spotify_redirect_uri: non_empty(SETTING_SPOTIFY_REDIRECT_URI),
        })
    }
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigUpdate {
    pub preset: Option<String>,
    pub target_lufs: Option<f64>,
    pub true_peak: Option<f64>,
    pub bitrate_k: Option<u32>,
    pub mono: Option<bool>,
    pub max_tonie_min: Option<u32>,
    pub metrics_enabled: Option<bool>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub spotify_redirect_uri: Option<String>,
}

impl ConfigUpdate {
    /// Key/value pairs to write, in stored string form
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();

        if let Some(v) = &self.preset {
            pairs.push((SETTING_PRESET, v.clone()));
        }
        if let Some(v) = self.target_lufs {
            pairs.push((SETTING_TARGET_LUFS, v.to_string()));
        }
        if let Some(v) = self.true_peak {
            pairs.push((SETTING_TRUE_PEAK, v.to_string()));
        }
        if let Some(v) = self.bitrate_k {
            pairs.push((SETTING_BITRATE_K, v.to_string()));
        }
        if let Some(v) = self.mono {
            pairs.push((SETTING_MONO, v.to_string()));
        }
        if let Some(v) = self.max_tonie_min {
            pairs.push((SETTING_MAX_TONIE_MIN, v.to_string()));
        }
        if let Some(v) = self.metrics_enabled {
            pairs.push((SETTING_METRICS_ENABLED, v.to_string()));
        }
        if let Some(v) = &self.spotify_client_id {
            pairs.push((SETTING_SPOTIFY_CLIENT_ID, v.clone()));
        }
        if let Some(v) = &self.spotify_client_secret {
            pairs.push((SETTING_SPOTIFY_CLIENT_SECRET, v.clone()));
        }
        if let Some(v) = &self.spotify_redirect_uri {
            pairs.push((SETTING_SPOTIFY_REDIRECT_URI, v.clone()));
        }

        pairs
    }
}

impl Store {
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
                .bind(key)
                .fetch_optional(self.pool())
                .await?;

        Ok(value.flatten())
    }

    /// Last write wins
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn all_settings(&self) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, Option<String>)> = sqlx::query_as("SELECT key, value FROM settings")
            .fetch_all(self.pool())
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect())
    }

    /// Write every field present in `update`
    pub async fn apply_config_update(&self, update: &ConfigUpdate) -> Result<usize> {
        let pairs = update.to_pairs();
        for (key, value) in &pairs {
            self.set_setting(key, value).await?;
        }
        Ok(pairs.len())
    }
}
