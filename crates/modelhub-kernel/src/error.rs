//! Crate-level error types for `modelhub-kernel`.
//!
//! [`RegistryError`] is the taxonomy surfaced by registry operations.
//! Per-group parse issues are deliberately *not* errors: they travel as
//! [`ScanWarning`] values inside the published snapshot.

use crate::convert::ConversionError;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by registry operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// Bad caller input: empty name, invalid root, duplicate registration.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A model, symbol or group key is absent.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// A symbol maps to more than one group and no group key was given.
    #[error("symbol `{symbol}` is ambiguous, pass one of: {}", .group_keys.join(", "))]
    Ambiguous {
        symbol: String,
        group_keys: Vec<String>,
    },

    /// The model root could not be scanned at all.
    #[error("Scan error on {}: {source}", .root.display())]
    Scan {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl RegistryError {
    pub fn model_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "model",
            name: name.into(),
        }
    }

    pub fn symbol_not_found(symbol: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "symbol",
            name: symbol.into(),
        }
    }

    pub fn group_not_found(group_key: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "group",
            name: group_key.into(),
        }
    }

    pub fn scan(root: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Scan {
            root: root.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Non-fatal scan finding, attached to the snapshot it was produced for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Group the warning belongs to; `None` for root-level findings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
    pub message: String,
}

impl ScanWarning {
    pub fn for_group(group_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            group_key: Some(group_key.into()),
            message: message.into(),
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self {
            group_key: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group_key {
            Some(group_key) => write!(f, "{group_key}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}
