//! Registration store implementations
//!
//! [`JsonRegistrationStore`] keeps one JSON document per model name and
//! writes with the write-then-rename pattern: data goes to a temp file in the
//! same directory, is `fsync`'d, then atomically renamed over the target.
//! [`MemoryRegistrationStore`] is the non-persistent variant for tests and
//! one-shot tooling.

use chrono::Utc;
use modelhub_kernel::{RegisteredRoot, RegistrationStore, StoreError};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::warn;

/// Hex characters of the name digest appended to each file stem.
const NAME_DIGEST_LEN: usize = 12;

pub struct JsonRegistrationStore {
    dir: PathBuf,
}

impl JsonRegistrationStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StoreError::CreateDir {
            path: dir.clone(),
            source: e,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn get(&self, model_name: &str) -> Result<Option<RegisteredRoot>, StoreError> {
        let path = self.path_for(model_name);
        if !path.exists() {
            return Ok(None);
        }

        let payload = fs::read(&path).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e,
        })?;
        let entry = serde_json::from_slice(&payload)
            .map_err(|e| StoreError::Deserialize { path, source: e })?;
        Ok(Some(entry))
    }

    /// Atomic write: temp file in the same directory, `fsync`, rename.
    fn write(&self, entry: &RegisteredRoot) -> Result<(), StoreError> {
        let target = self.path_for(&entry.model_name);
        let payload = serde_json::to_vec_pretty(entry)?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(StoreError::Write)?;
        tmp.write_all(&payload).map_err(StoreError::Write)?;
        tmp.as_file().sync_all().map_err(StoreError::Write)?;
        tmp.persist(&target).map_err(|e| StoreError::Persist {
            path: target,
            source: e.error,
        })?;
        Ok(())
    }

    fn path_for(&self, model_name: &str) -> PathBuf {
        let safe: String = model_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        let stem = if safe.trim_matches('.').is_empty() {
            "_"
        } else {
            safe.as_str()
        };

        // Sanitizing is lossy; the digest of the raw name keeps files distinct.
        let digest = hex::encode(Sha256::digest(model_name.as_bytes()));
        self.dir
            .join(format!("{stem}-{}.json", &digest[..NAME_DIGEST_LEN]))
    }
}

impl RegistrationStore for JsonRegistrationStore {
    /// Corrupt or unreadable entries are logged and skipped; one bad file
    /// must not hide every other registration at startup.
    fn load_registered_roots(&self) -> Result<Vec<RegisteredRoot>, StoreError> {
        let mut roots = Vec::new();

        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::Io {
            path: self.dir.clone(),
            source: e,
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Io {
                path: self.dir.clone(),
                source: e,
            })?;
            let path = entry.path();

            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            match fs::read(&path).and_then(|payload| {
                serde_json::from_slice::<RegisteredRoot>(&payload)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            }) {
                Ok(root) => roots.push(root),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping corrupt registration entry");
                }
            }
        }

        roots.sort_by(|a, b| a.model_name.cmp(&b.model_name));
        Ok(roots)
    }

    fn save_registered_root(&self, model_name: &str, root_path: &Path) -> Result<(), StoreError> {
        let entry = match self.get(model_name) {
            Ok(Some(mut existing)) if existing.model_name == model_name => {
                existing.root_path = root_path.to_path_buf();
                existing.updated_at = Utc::now();
                existing
            }
            _ => RegisteredRoot::new(model_name, root_path),
        };
        self.write(&entry)
    }

    fn delete_registered_root(&self, model_name: &str) -> Result<bool, StoreError> {
        let path = self.path_for(model_name);
        if !path.exists() {
            return Ok(false);
        }

        fs::remove_file(&path).map_err(|e| StoreError::Io { path, source: e })?;
        Ok(true)
    }
}

/// In-process store; registrations vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryRegistrationStore {
    roots: RwLock<BTreeMap<String, RegisteredRoot>>,
}

impl MemoryRegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roots(roots: impl IntoIterator<Item = RegisteredRoot>) -> Self {
        Self {
            roots: RwLock::new(
                roots
                    .into_iter()
                    .map(|root| (root.model_name.clone(), root))
                    .collect(),
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.roots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.read().is_empty()
    }
}

impl RegistrationStore for MemoryRegistrationStore {
    fn load_registered_roots(&self) -> Result<Vec<RegisteredRoot>, StoreError> {
        Ok(self.roots.read().values().cloned().collect())
    }

    fn save_registered_root(&self, model_name: &str, root_path: &Path) -> Result<(), StoreError> {
        let mut roots = self.roots.write();
        roots
            .entry(model_name.to_string())
            .and_modify(|existing| {
                existing.root_path = root_path.to_path_buf();
                existing.updated_at = Utc::now();
            })
            .or_insert_with(|| RegisteredRoot::new(model_name, root_path));
        Ok(())
    }

    fn delete_registered_root(&self, model_name: &str) -> Result<bool, StoreError> {
        Ok(self.roots.write().remove(model_name).is_some())
    }
}
