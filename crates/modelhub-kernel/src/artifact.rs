//! Artifact naming contract
//!
//! Every artifact on disk is named `{group_key}{suffix}`, where the suffix
//! identifies its kind. The suffix strings are shared with the artifact
//! producer and must stay stable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of an artifact file, derived from its suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Ordered factor names, one per line
    FactorList,
    /// Per-factor information coefficients (CSV)
    IcTable,
    /// Training metadata (pickled mapping)
    InfoBlob,
    /// Raw trained model (pickle)
    RawModel,
    /// Served model (XGBoost JSON)
    ServedModel,
}

impl ArtifactKind {
    /// All kinds, in record-building order.
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::FactorList,
        ArtifactKind::IcTable,
        ArtifactKind::InfoBlob,
        ArtifactKind::RawModel,
        ArtifactKind::ServedModel,
    ];

    /// File-name suffix for this kind.
    pub const fn suffix(self) -> &'static str {
        match self {
            ArtifactKind::FactorList => "_factors.txt",
            ArtifactKind::IcTable => "_ic.csv",
            ArtifactKind::InfoBlob => "_info.pkl",
            ArtifactKind::RawModel => "_model.pkl",
            ArtifactKind::ServedModel => "_model.json",
        }
    }

    /// Human readable label used in warnings.
    pub const fn label(self) -> &'static str {
        match self {
            ArtifactKind::FactorList => "factor list",
            ArtifactKind::IcTable => "IC table",
            ArtifactKind::InfoBlob => "info blob",
            ArtifactKind::RawModel => "raw model",
            ArtifactKind::ServedModel => "served model",
        }
    }

    /// Whether the grouper reads the file content (and can therefore
    /// record a content digest for it).
    pub const fn is_parsed(self) -> bool {
        !matches!(self, ArtifactKind::RawModel)
    }

    /// Splits a file name into its kind and group key.
    ///
    /// The returned group key may be empty (`_factors.txt`); callers decide
    /// whether such a group is usable.
    pub fn classify(file_name: &str) -> Option<(ArtifactKind, &str)> {
        Self::ALL.iter().find_map(|kind| {
            file_name
                .strip_suffix(kind.suffix())
                .map(|group_key| (*kind, group_key))
        })
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Leading `_`-separated token of a group key.
pub fn symbol_of(group_key: &str) -> &str {
    group_key.split('_').next().unwrap_or_default().trim()
}

/// Remainder of a group key after its symbol token.
pub fn return_name_of(group_key: &str) -> &str {
    group_key
        .split_once('_')
        .map(|(_, rest)| rest.trim())
        .unwrap_or_default()
}

/// Whether a path names a recognised artifact.
pub fn is_artifact_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(ArtifactKind::classify)
        .is_some()
}

/// A classified artifact file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub group_key: String,
    pub symbol: String,
}

impl ArtifactFile {
    /// Classifies `path` by its file name. Returns `None` for files outside
    /// the naming contract.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        let (kind, group_key) = ArtifactKind::classify(file_name)?;
        Some(Self {
            path: path.to_path_buf(),
            kind,
            group_key: group_key.to_string(),
            symbol: symbol_of(group_key).to_string(),
        })
    }

    /// A group is usable only when a symbol can be derived from its key.
    pub fn has_symbol(&self) -> bool {
        !self.symbol.is_empty()
    }
}
