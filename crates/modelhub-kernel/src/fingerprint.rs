//! Per-file change signatures
//!
//! A [`Fingerprint`] is the cheap `(size, mtime)` pair, optionally backed by
//! a content digest. The digest is what lets a diff tell a touched file from
//! an edited one when size and mtime disagree.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::Metadata;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

/// Change signature of one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    /// File size in bytes
    pub size: u64,
    /// Modification time, nanoseconds since the Unix epoch
    pub modified_ns: u64,
    /// Lowercase hex SHA-256 of the content, when it was read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl Fingerprint {
    pub fn new(size: u64, modified_ns: u64) -> Self {
        Self {
            size,
            modified_ns,
            digest: None,
        }
    }

    /// Stat-only fingerprint from file metadata.
    pub fn from_metadata(meta: &Metadata) -> Self {
        let modified_ns = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        Self::new(meta.len(), modified_ns)
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    /// Size and mtime both agree.
    pub fn stat_matches(&self, other: &Fingerprint) -> bool {
        self.size == other.size && self.modified_ns == other.modified_ns
    }

    /// Stable textual form, used when deriving cache keys.
    pub fn token(&self) -> String {
        format!(
            "{}:{}:{}",
            self.size,
            self.modified_ns,
            self.digest.as_deref().unwrap_or("-")
        )
    }
}

/// Fingerprints keyed by absolute file path.
pub type FingerprintMap = BTreeMap<PathBuf, Fingerprint>;

/// Result of comparing a baseline map against the files currently on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FingerprintDiff {
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub changed: Vec<PathBuf>,
}

impl FingerprintDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
