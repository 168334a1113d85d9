//! Raw-model to served-model conversion seam

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Why an artifact could not be converted.
///
/// Callers record this as a warning on the affected record and mark its
/// served model unavailable; it never fails a scan.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConversionError {
    #[error("no converter configured")]
    NotConfigured,

    #[error("source artifact {} is unreadable: {source}", .path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("converter `{converter}` failed on {}: {message}", .path.display())]
    Failed {
        converter: String,
        path: PathBuf,
        message: String,
    },

    #[error("converter `{converter}` timed out after {timeout:?} on {}", .path.display())]
    Timeout {
        converter: String,
        path: PathBuf,
        timeout: Duration,
    },

    #[error("converter `{converter}` produced no output for {}", .path.display())]
    EmptyOutput { converter: String, path: PathBuf },

    #[error("conversion cache I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Turns a raw model into its served form.
///
/// Implementations write the result to `target`; the cache owns temp-file
/// placement and the final atomic rename.
pub trait Converter: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Extension of the produced file, without the dot.
    fn target_extension(&self) -> &str {
        "json"
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<(), ConversionError>;
}
