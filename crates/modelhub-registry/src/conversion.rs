//! Single-flight conversion cache
//!
//! Converted artifacts are content addressed: the cache key is a hash of the
//! source fingerprint and path, so a changed source simply maps to a new key.
//! Concurrent requests for one key serialize on a per-key mutex and only the
//! first performs the conversion. Nothing is ever evicted.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use modelhub_kernel::{ConversionError, Converter, Fingerprint};
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// Hex characters of the key digest kept in file names.
const KEY_LEN: usize = 24;

/// Index entry for one converted source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionCacheEntry {
    pub key: String,
    pub fingerprint: Fingerprint,
    pub served_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

pub struct ConversionCache {
    dir: PathBuf,
    converter: Arc<dyn Converter>,
    /// Source path to its latest conversion
    index: DashMap<PathBuf, ConversionCacheEntry>,
    /// Per-key single-flight locks
    inflight: DashMap<String, Arc<Mutex<()>>>,
    conversions: AtomicUsize,
}

impl ConversionCache {
    /// Creates the cache directory if needed.
    pub fn new(dir: impl Into<PathBuf>, converter: Arc<dyn Converter>) -> Result<Self, ConversionError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| ConversionError::Io {
            path: dir.clone(),
            source: e,
        })?;
        Ok(Self {
            dir,
            converter,
            index: DashMap::new(),
            inflight: DashMap::new(),
            conversions: AtomicUsize::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of conversions actually run (cache hits excluded).
    pub fn conversions(&self) -> usize {
        self.conversions.load(Ordering::Relaxed)
    }

    /// Current index entry for `source`, if any.
    pub fn entry(&self, source: &Path) -> Option<ConversionCacheEntry> {
        self.index.get(source).map(|entry| entry.value().clone())
    }

    /// Cache key for a source at a given fingerprint.
    pub fn cache_key(source: &Path, fingerprint: &Fingerprint) -> String {
        let mut hasher = Sha256::new();
        hasher.update(fingerprint.token());
        hasher.update(b"|");
        hasher.update(source.to_string_lossy().as_bytes());
        let mut key = hex::encode(hasher.finalize());
        key.truncate(KEY_LEN);
        key
    }

    /// Returns the served form of `source`, converting it if no conversion
    /// for this exact fingerprint exists yet.
    ///
    /// # Errors
    ///
    /// Any [`ConversionError`] raised while converting. Failures are not
    /// cached; the next call retries.
    pub fn get_or_convert(
        &self,
        source: &Path,
        fingerprint: &Fingerprint,
    ) -> Result<PathBuf, ConversionError> {
        if let Some(path) = self.lookup(source, fingerprint) {
            return Ok(path);
        }

        let key = Self::cache_key(source, fingerprint);
        let lock = self.inflight.entry(key.clone()).or_default().value().clone();
        let result = {
            let _guard = lock.lock();
            self.convert_locked(source, fingerprint, key.clone())
        };
        // Only this caller and the map still hold the lock: nobody is waiting.
        self.inflight
            .remove_if(&key, |_, held| Arc::strong_count(held) == 2);
        result
    }

    fn convert_locked(
        &self,
        source: &Path,
        fingerprint: &Fingerprint,
        key: String,
    ) -> Result<PathBuf, ConversionError> {
        // Another caller may have finished while we waited.
        if let Some(path) = self.lookup(source, fingerprint) {
            return Ok(path);
        }

        let target = self
            .dir
            .join(format!("{key}.{}", self.converter.target_extension()));
        if is_non_empty(&target) {
            debug!(source = %source.display(), target = %target.display(), "adopting persisted conversion");
        } else {
            self.convert_into(source, &target)?;
            self.conversions.fetch_add(1, Ordering::Relaxed);
            info!(
                source = %source.display(),
                target = %target.display(),
                converter = self.converter.name(),
                "converted artifact"
            );
        }

        self.index.insert(
            source.to_path_buf(),
            ConversionCacheEntry {
                key,
                fingerprint: fingerprint.clone(),
                served_path: target.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(target)
    }

    fn lookup(&self, source: &Path, fingerprint: &Fingerprint) -> Option<PathBuf> {
        let entry = self.index.get(source)?;
        (entry.fingerprint == *fingerprint && is_non_empty(&entry.served_path))
            .then(|| entry.served_path.clone())
    }

    /// Converts into a temp file next to `target`, then renames it into place.
    fn convert_into(&self, source: &Path, target: &Path) -> Result<(), ConversionError> {
        fs::metadata(source).map_err(|e| ConversionError::Source {
            path: source.to_path_buf(),
            source: e,
        })?;

        // Converters may pick their output format from the file extension.
        let tmp = tempfile::Builder::new()
            .suffix(&format!(".tmp.{}", self.converter.target_extension()))
            .tempfile_in(&self.dir)
            .map_err(|e| ConversionError::Io {
            path: self.dir.clone(),
            source: e,
        })?;
        self.converter.convert(source, tmp.path())?;

        if !is_non_empty(tmp.path()) {
            return Err(ConversionError::EmptyOutput {
                converter: self.converter.name().to_string(),
                path: source.to_path_buf(),
            });
        }

        tmp.persist(target).map_err(|e| ConversionError::Io {
            path: target.to_path_buf(),
            source: e.error,
        })?;
        Ok(())
    }
}

impl std::fmt::Debug for ConversionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionCache")
            .field("dir", &self.dir)
            .field("converter", &self.converter.name())
            .field("entries", &self.index.len())
            .finish()
    }
}

fn is_non_empty(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}
