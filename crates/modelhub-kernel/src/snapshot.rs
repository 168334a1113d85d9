//! Immutable model snapshots
//!
//! A [`ModelSnapshot`] is published once and never mutated afterwards, so
//! readers can hold an `Arc` to it without locking. The single exception is
//! the append-only degradation log: a failed refresh keeps the current
//! snapshot (same `Arc`) and appends a warning to it instead of publishing a
//! new one. The log keeps the most recent [`MAX_DEGRADATIONS`] entries.

use crate::error::ScanWarning;
use crate::fingerprint::FingerprintMap;
use crate::record::{SymbolRecord, normalize_symbol};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Appended warnings kept per snapshot; older ones are dropped first.
pub const MAX_DEGRADATIONS: usize = 64;

/// Output of one successful scan of a model root.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Records ordered by group key
    pub records: Vec<SymbolRecord>,
    pub warnings: Vec<ScanWarning>,
    /// Every artifact file seen under the root, including dropped groups
    pub fingerprints: FingerprintMap,
}

/// Point-in-time view of one registered model.
#[derive(Debug)]
pub struct ModelSnapshot {
    model_name: String,
    root: PathBuf,
    scanned_at: DateTime<Utc>,
    generation: u64,
    records: Vec<Arc<SymbolRecord>>,
    warnings: Vec<ScanWarning>,
    fingerprints: FingerprintMap,
    degradations: RwLock<VecDeque<ScanWarning>>,
}

impl ModelSnapshot {
    pub fn from_scan(
        model_name: impl Into<String>,
        root: impl Into<PathBuf>,
        generation: u64,
        outcome: ScanOutcome,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            root: root.into(),
            scanned_at: Utc::now(),
            generation,
            records: outcome.records.into_iter().map(Arc::new).collect(),
            warnings: outcome.warnings,
            fingerprints: outcome.fingerprints,
            degradations: RwLock::new(VecDeque::new()),
        }
    }

    /// Empty snapshot standing in for a registration whose root could not
    /// be scanned. Its empty fingerprint map makes any later content look
    /// like drift, so the watcher picks it up once the root is readable.
    pub fn placeholder(
        model_name: impl Into<String>,
        root: impl Into<PathBuf>,
        warning: ScanWarning,
    ) -> Self {
        let outcome = ScanOutcome {
            warnings: vec![warning],
            ..ScanOutcome::default()
        };
        Self::from_scan(model_name, root, 1, outcome)
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scanned_at(&self) -> DateTime<Utc> {
        self.scanned_at
    }

    /// 1 for the first publish of a model name, incremented by every
    /// successful refresh.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn records(&self) -> &[Arc<SymbolRecord>] {
        &self.records
    }

    pub fn fingerprints(&self) -> &FingerprintMap {
        &self.fingerprints
    }

    /// Warnings produced by the scan that built this snapshot.
    pub fn scan_warnings(&self) -> &[ScanWarning] {
        &self.warnings
    }

    /// Scan warnings followed by everything appended since publication.
    pub fn warnings(&self) -> Vec<ScanWarning> {
        let degradations = self.degradations.read();
        self.warnings
            .iter()
            .chain(degradations.iter())
            .cloned()
            .collect()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len() + self.degradations.read().len()
    }

    /// Appends a degradation notice. Records and fingerprints are untouched.
    pub fn append_warning(&self, warning: ScanWarning) {
        let mut degradations = self.degradations.write();
        if degradations.len() == MAX_DEGRADATIONS {
            degradations.pop_front();
        }
        degradations.push_back(warning);
    }

    pub fn group_count(&self) -> usize {
        self.records.len()
    }

    /// Distinct symbols, case-insensitively.
    pub fn symbols(&self) -> BTreeSet<String> {
        self.records
            .iter()
            .map(|record| normalize_symbol(&record.symbol))
            .collect()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols().len()
    }

    pub fn record(&self, group_key: &str) -> Option<&Arc<SymbolRecord>> {
        self.records
            .iter()
            .find(|record| record.group_key == group_key)
    }

    pub fn records_for_symbol(&self, symbol: &str) -> Vec<&Arc<SymbolRecord>> {
        self.records
            .iter()
            .filter(|record| record.matches_symbol(symbol))
            .collect()
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            name: self.model_name.clone(),
            root: self.root.clone(),
            symbol_count: self.symbol_count(),
            group_count: self.group_count(),
            warning_count: self.warning_count(),
            generation: self.generation,
            scanned_at: self.scanned_at,
        }
    }
}

impl Serialize for ModelSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct View<'a> {
            model_name: &'a str,
            root: &'a Path,
            scanned_at: DateTime<Utc>,
            generation: u64,
            symbol_count: usize,
            group_count: usize,
            records: Vec<&'a SymbolRecord>,
            warnings: Vec<String>,
        }

        View {
            model_name: &self.model_name,
            root: &self.root,
            scanned_at: self.scanned_at,
            generation: self.generation,
            symbol_count: self.symbol_count(),
            group_count: self.group_count(),
            records: self.records.iter().map(AsRef::as_ref).collect(),
            warnings: self.warnings().iter().map(ToString::to_string).collect(),
        }
        .serialize(serializer)
    }
}

/// Listing entry for one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub root: PathBuf,
    pub symbol_count: usize,
    pub group_count: usize,
    pub warning_count: usize,
    pub generation: u64,
    pub scanned_at: DateTime<Utc>,
}
