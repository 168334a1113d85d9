//! Application settings
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration.

use super::{ConfigResult, ENV_PREFIX, load_with_env};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelHubConfig {
    pub watch: WatchSettings,
    pub storage: StorageSettings,
    pub conversion: ConversionSettings,
    pub logging: LoggingSettings,
}

impl ModelHubConfig {
    /// Defaults, then `path` if given, then `MODELHUB_*` environment overrides.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        load_with_env(path, ENV_PREFIX)
    }
}

/// Background watcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    pub enabled: bool,
    pub interval_secs: f64,
    pub debounce_secs: f64,
    /// Use filesystem notifications to wake roots early
    pub fs_events: bool,
    pub refresh_timeout_secs: f64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5.0,
            debounce_secs: 2.0,
            fs_events: false,
            refresh_timeout_secs: 120.0,
        }
    }
}

impl WatchSettings {
    /// Poll interval, at least one second.
    pub fn interval(&self) -> Duration {
        secs(self.interval_secs).max(Duration::from_secs(1))
    }

    pub fn debounce(&self) -> Duration {
        secs(self.debounce_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        secs(self.refresh_timeout_secs)
    }
}

/// On-disk state locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
    /// Defaults to `{data_dir}/registrations`
    pub registrations_dir: Option<PathBuf>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            registrations_dir: None,
        }
    }
}

impl StorageSettings {
    pub fn registrations_dir(&self) -> PathBuf {
        self.registrations_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("registrations"))
    }
}

/// Raw-to-served model conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionSettings {
    pub enabled: bool,
    /// Defaults to `{data_dir}/converted_models`
    pub cache_dir: Option<PathBuf>,
    /// Program followed by its arguments; `{input}` and `{output}` are
    /// replaced with the source and destination paths.
    pub command: Vec<String>,
    pub extension: String,
    pub timeout_secs: f64,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            cache_dir: None,
            command: Vec::new(),
            extension: "json".to_string(),
            timeout_secs: 300.0,
        }
    }
}

impl ConversionSettings {
    pub fn cache_dir(&self, storage: &StorageSettings) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| storage.data_dir.join("converted_models"))
    }

    /// `None` when the timeout is zero (unbounded).
    pub fn timeout(&self) -> Option<Duration> {
        let timeout = secs(self.timeout_secs);
        (!timeout.is_zero()).then_some(timeout)
    }
}

/// Log output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}
