//! Parsed per-group records

use crate::fingerprint::FingerprintMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// IC statistics for one factor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IcStat {
    /// Kendall rank correlation between factor and return
    pub kendall_tau: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_name: Option<String>,
}

/// Factor name to IC statistics.
pub type IcTable = BTreeMap<String, IcStat>;

/// One input dimension of the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimFactor {
    pub dim: usize,
    pub factor_name: String,
    pub kendall_tau: Option<f64>,
}

/// Training provenance taken from the info blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingInfo {
    /// Window start, Unix timestamp
    pub window_start: Option<i64>,
    /// Window end, Unix timestamp
    pub window_end: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub samples: Option<u64>,
    pub train_time_sec: Option<f64>,
}

/// Metadata read from a served (XGBoost JSON) model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMeta {
    pub num_feature: Option<u64>,
    pub objective: Option<String>,
    pub num_trees: Option<u64>,
    pub version: Option<String>,
}

/// Everything known about one artifact group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub symbol: String,
    pub group_key: String,
    pub return_name: String,
    pub feature_dim: usize,
    pub factors: Vec<String>,
    pub dim_factors: Vec<DimFactor>,
    pub ic: IcTable,
    pub training: TrainingInfo,
    pub raw_model: Option<PathBuf>,
    pub served_model: Option<PathBuf>,
    /// False whenever no served model could be located or produced; the
    /// reason is in `warnings`.
    pub served_available: bool,
    pub model_meta: Option<ModelMeta>,
    pub fingerprints: FingerprintMap,
    pub warnings: Vec<String>,
}

impl SymbolRecord {
    /// Empty record for `group_key`; the grouper fills it in.
    pub fn new(symbol: impl Into<String>, group_key: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            group_key: group_key.into(),
            return_name: String::new(),
            feature_dim: 0,
            factors: Vec::new(),
            dim_factors: Vec::new(),
            ic: IcTable::new(),
            training: TrainingInfo::default(),
            raw_model: None,
            served_model: None,
            served_available: false,
            model_meta: None,
            fingerprints: FingerprintMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Case-insensitive symbol match.
    pub fn matches_symbol(&self, symbol: &str) -> bool {
        normalize_symbol(&self.symbol) == normalize_symbol(symbol)
    }
}

/// Canonical form used for symbol lookups.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}
