//! Drift detection for model roots
//!
//! [`FingerprintIndex::capture`] stats every artifact file below a root;
//! [`FingerprintIndex::diff`] compares that against the fingerprint map of
//! the current snapshot. Size/mtime is the cheap path. When the size agrees
//! but the mtime moved, the file is hashed and compared with the baseline
//! digest, so a bare touch does not count as a change.

use modelhub_kernel::artifact::is_artifact_path;
use modelhub_kernel::fingerprint::content_digest;
use modelhub_kernel::{Fingerprint, FingerprintDiff, FingerprintMap};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Signature reported for a root that does not exist.
pub const MISSING_ROOT_SIGNATURE: &str = "missing";

/// Stat-only view of a root at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootState {
    pub exists: bool,
    pub entries: FingerprintMap,
    /// Digest over every `(path, size, mtime)`; equal signatures mean
    /// nothing moved between two captures.
    pub signature: String,
}

impl RootState {
    fn missing() -> Self {
        Self {
            exists: false,
            entries: FingerprintMap::new(),
            signature: MISSING_ROOT_SIGNATURE.to_string(),
        }
    }
}

/// Stateless fingerprinting helpers.
pub struct FingerprintIndex;

impl FingerprintIndex {
    /// Stats every artifact file below `root`. Unreadable entries are
    /// skipped; a missing root yields an empty, `exists = false` state.
    pub fn capture(root: &Path) -> RootState {
        if !root.is_dir() {
            return RootState::missing();
        }

        let mut entries = FingerprintMap::new();
        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(root = %root.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_artifact_path(entry.path()) {
                continue;
            }
            match entry.metadata() {
                Ok(meta) => {
                    entries.insert(entry.into_path(), Fingerprint::from_metadata(&meta));
                }
                Err(e) => {
                    debug!(path = %entry.path().display(), error = %e, "cannot stat artifact");
                }
            }
        }

        let signature = Self::signature(root, &entries);
        RootState {
            exists: true,
            entries,
            signature,
        }
    }

    /// Compares `current` against `baseline`, escalating to a content hash
    /// when only the mtime differs.
    pub fn diff(baseline: &FingerprintMap, current: &RootState) -> FingerprintDiff {
        let mut diff = FingerprintDiff::default();

        for (path, now) in &current.entries {
            match baseline.get(path) {
                None => diff.added.push(path.clone()),
                Some(before) if before.stat_matches(now) => {}
                Some(before) if before.size != now.size => diff.changed.push(path.clone()),
                Some(before) => {
                    let same_content = match &before.digest {
                        Some(expected) => Self::file_digest(path)
                            .map(|actual| &actual == expected)
                            .unwrap_or(false),
                        None => false,
                    };
                    if !same_content {
                        diff.changed.push(path.clone());
                    }
                }
            }
        }

        diff.removed = baseline
            .keys()
            .filter(|path| !current.entries.contains_key(*path))
            .cloned()
            .collect();

        diff
    }

    /// SHA-256 of a file's content.
    pub fn file_digest(path: &Path) -> std::io::Result<String> {
        std::fs::read(path).map(|bytes| content_digest(&bytes))
    }

    fn signature(root: &Path, entries: &FingerprintMap) -> String {
        let mut hasher = Sha256::new();
        for (path, fp) in entries {
            let rel = path.strip_prefix(root).unwrap_or(path);
            hasher.update(format!("{}|{}|{}\n", rel.display(), fp.size, fp.modified_ns));
        }
        hasher.update(format!("count={}", entries.len()));
        hex::encode(hasher.finalize())
    }
}
