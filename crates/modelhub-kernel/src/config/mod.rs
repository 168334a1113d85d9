//! Configuration loading
//!
//! Layered loading through the `config` crate: built-in defaults, then an
//! optional file (format detected from its extension, `${VAR}` / `$VAR`
//! substituted), then prefixed environment variables using `__` for nesting.

mod settings;

pub use settings::{
    ConversionSettings, LoggingSettings, ModelHubConfig, StorageSettings, WatchSettings,
};

use config::{Config as Cfg, Environment, File, FileFormat};
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Prefix for environment overrides, e.g. `MODELHUB_WATCH__INTERVAL_SECS`.
pub const ENV_PREFIX: &str = "MODELHUB";

static BRACED_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("braced env var pattern is valid")
});

static BARE_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b").expect("bare env var pattern is valid")
});

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {0} has no recognised extension (expected yaml, yml, toml or json)")]
    UnsupportedFormat(PathBuf),

    #[error("invalid configuration: {0}")]
    Parse(#[from] config::ConfigError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// File format from the extension: `.yaml`/`.yml`, `.toml` or `.json`.
pub fn detect_format(path: &Path) -> ConfigResult<FileFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("yaml" | "yml") => Ok(FileFormat::Yaml),
        Some("toml") => Ok(FileFormat::Toml),
        Some("json") => Ok(FileFormat::Json),
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Replaces `${VAR}` and `$VAR` with the variable's value. References to
/// unset variables are kept verbatim.
pub fn substitute_env_vars(content: &str) -> String {
    let braced = BRACED_VAR.replace_all(content, env_value);
    BARE_VAR.replace_all(&braced, env_value).into_owned()
}

fn env_value(caps: &Captures<'_>) -> String {
    std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
}

/// Layers an optional file and `{prefix}_{SECTION}__{KEY}` environment
/// variables over the `#[serde(default)]` values of `T`.
pub fn load_with_env<T: DeserializeOwned>(path: Option<&Path>, env_prefix: &str) -> ConfigResult<T> {
    let mut builder = Cfg::builder();

    if let Some(path) = path {
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        builder = builder.add_source(File::from_str(&substitute_env_vars(&content), format));
    }

    let env = Environment::with_prefix(env_prefix)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true);
    Ok(builder.add_source(env).build()?.try_deserialize()?)
}
