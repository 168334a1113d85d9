//! Persistent registration store interface
//!
//! The registry consults the store at startup and writes through to it on
//! register/delete. Store failures never undo an in-memory registration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("failed to create store directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize store entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to deserialize store entry {}: {source}", .path.display())]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write store entry: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to move store entry into place at {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backend refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A persisted `(model name, root)` registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredRoot {
    pub model_name: String,
    pub root_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RegisteredRoot {
    pub fn new(model_name: impl Into<String>, root_path: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            model_name: model_name.into(),
            root_path: root_path.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Storage for model registrations.
pub trait RegistrationStore: Send + Sync {
    /// All registrations, ordered by model name.
    fn load_registered_roots(&self) -> Result<Vec<RegisteredRoot>, StoreError>;

    /// Inserts or updates a registration.
    fn save_registered_root(&self, model_name: &str, root_path: &Path) -> Result<(), StoreError>;

    /// Removes a registration; returns whether one existed.
    fn delete_registered_root(&self, model_name: &str) -> Result<bool, StoreError>;
}
