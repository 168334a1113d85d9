//! Model registry
//!
//! Holds the current [`ModelSnapshot`] for every registered model in a
//! copy-on-write map behind an [`ArcSwap`]. Readers load the map without
//! locking and always see a complete snapshot. Writers scan outside any lock,
//! then take the process-wide reentrant lock only to clone the map, apply
//! their change and swap the pointer.
//!
//! A refresh never downgrades visibility: if the rescan fails, the previous
//! snapshot stays published (same `Arc`) and records the failure in its
//! append-only warning log.

use crate::conversion::ConversionCache;
use crate::grouper::ArtifactGrouper;
use arc_swap::ArcSwap;
use modelhub_kernel::record::normalize_symbol;
use modelhub_kernel::{
    DimFactor, ModelSnapshot, ModelSummary, RegistrationStore, RegistryError, RegistryResult,
    ScanWarning, StoreError, SymbolRecord,
};
use parking_lot::ReentrantMutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

type ModelMap = BTreeMap<String, Arc<ModelSnapshot>>;

/// Served-model lookup result. `available = false` always comes with a
/// `warning` explaining why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServedModel {
    pub model_name: String,
    pub symbol: String,
    pub group_key: String,
    pub feature_dim: usize,
    pub path: Option<PathBuf>,
    pub available: bool,
    pub warning: Option<String>,
    pub dim_factors: Vec<DimFactor>,
}

pub struct ModelRegistry {
    models: ArcSwap<ModelMap>,
    write_lock: ReentrantMutex<()>,
    grouper: ArtifactGrouper,
    store: Arc<dyn RegistrationStore>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn RegistrationStore>) -> Self {
        Self {
            models: ArcSwap::from_pointee(ModelMap::new()),
            write_lock: ReentrantMutex::new(()),
            grouper: ArtifactGrouper::new(),
            store,
        }
    }

    /// Attach a conversion cache used for raw-only groups, both during scans
    /// and by [`served_model`](Self::served_model).
    pub fn with_conversion(mut self, cache: Arc<ConversionCache>) -> Self {
        self.grouper = self.grouper.with_conversion(cache);
        self
    }

    pub fn conversion(&self) -> Option<&Arc<ConversionCache>> {
        self.grouper.conversion()
    }

    /// Publishes every registration found in the store.
    ///
    /// Roots that cannot be scanned are published as empty placeholder
    /// snapshots carrying the scan error, so they stay listed and get
    /// picked up by the watcher once readable. Returns how many models were
    /// published.
    pub fn warmup(&self) -> Result<usize, StoreError> {
        let mut loaded = 0;

        for entry in self.store.load_registered_roots()? {
            let name = entry.model_name.trim();
            if name.is_empty() || self.contains(name) {
                continue;
            }

            let snapshot = match self.grouper.scan(&entry.root_path) {
                Ok(outcome) => ModelSnapshot::from_scan(name, &entry.root_path, 1, outcome),
                Err(e) => {
                    warn!(model = %name, root = %entry.root_path.display(), error = %e, "registered root unavailable at startup");
                    ModelSnapshot::placeholder(
                        name,
                        &entry.root_path,
                        ScanWarning::general(format!("scan failed: {e}")),
                    )
                }
            };

            let _guard = self.write_lock.lock();
            if !self.contains(name) {
                self.publish(name, Arc::new(snapshot));
                loaded += 1;
            }
        }

        info!(models = loaded, "registry warm-up complete");
        Ok(loaded)
    }

    /// Registers `root` under `name` after an initial scan.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Validation`] for an empty name, a root that is not
    ///   an existing directory, or a name that is already registered.
    /// - [`RegistryError::Scan`] when the root cannot be read.
    pub fn register(&self, name: &str, root: impl AsRef<Path>) -> RegistryResult<Arc<ModelSnapshot>> {
        let name = validate_name(name)?;
        let root = validate_root(root.as_ref())?;
        if self.contains(name) {
            return Err(already_registered(name));
        }

        let outcome = self.grouper.scan(&root)?;
        let snapshot = Arc::new(ModelSnapshot::from_scan(name, &root, 1, outcome));
        {
            let _guard = self.write_lock.lock();
            if self.contains(name) {
                return Err(already_registered(name));
            }
            self.publish(name, snapshot.clone());
        }
        info!(
            model = %name,
            root = %root.display(),
            groups = snapshot.group_count(),
            warnings = snapshot.warning_count(),
            "registered model"
        );

        if let Err(e) = self.store.save_registered_root(name, &root) {
            warn!(model = %name, error = %e, "registration not persisted, keeping in-memory entry");
            snapshot.append_warning(ScanWarning::general(format!(
                "registration not persisted: {e}"
            )));
        }
        Ok(snapshot)
    }

    /// Rescans a registered model and publishes the result.
    ///
    /// A failed scan is not an error: the current snapshot stays published,
    /// gains a warning, and is returned unchanged. A scan overtaken by a
    /// concurrent refresh is redone against the newer snapshot.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] if `name` is not registered (or was
    /// deleted while the scan ran).
    pub fn refresh(&self, name: &str) -> RegistryResult<Arc<ModelSnapshot>> {
        let name = name.trim();
        let mut current = self.get(name)?;

        let next = loop {
            let outcome = match self.grouper.scan(current.root()) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(model = %name, error = %e, "refresh failed, keeping previous snapshot");
                    current.append_warning(ScanWarning::general(format!(
                        "refresh failed at {}, serving previous snapshot: {e}",
                        chrono::Utc::now().to_rfc3339()
                    )));
                    return Ok(current);
                }
            };

            let _guard = self.write_lock.lock();
            let latest = self.get(name)?;
            if latest.root() != current.root() {
                // Re-registered elsewhere while we scanned.
                return Ok(latest);
            }
            if Arc::ptr_eq(&latest, &current) {
                let next = Arc::new(ModelSnapshot::from_scan(
                    name,
                    current.root(),
                    current.generation() + 1,
                    outcome,
                ));
                self.publish(name, next.clone());
                break next;
            }

            // A concurrent refresh published first; this scan may predate it.
            debug!(
                model = %name,
                generation = latest.generation(),
                "snapshot replaced during scan, rescanning"
            );
            current = latest;
        };

        info!(
            model = %name,
            generation = next.generation(),
            groups = next.group_count(),
            warnings = next.warning_count(),
            "refreshed model"
        );
        Ok(next)
    }

    /// Current snapshot for `name`. Lock-free.
    pub fn get(&self, name: &str) -> RegistryResult<Arc<ModelSnapshot>> {
        self.models
            .load()
            .get(name.trim())
            .cloned()
            .ok_or_else(|| RegistryError::model_not_found(name.trim()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.load().contains_key(name.trim())
    }

    /// Summaries ordered by model name. Lock-free.
    pub fn list(&self) -> Vec<ModelSummary> {
        self.models
            .load()
            .values()
            .map(|snapshot| snapshot.summary())
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.models.load().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.models.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.load().is_empty()
    }

    /// Resolves `symbol` (case-insensitive) to a single record.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Ambiguous`] when the symbol spans several groups
    ///   and no `group_key` was given.
    /// - [`RegistryError::NotFound`] for an unknown model, symbol or group.
    pub fn resolve_symbol(
        &self,
        name: &str,
        symbol: &str,
        group_key: Option<&str>,
    ) -> RegistryResult<Arc<SymbolRecord>> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(RegistryError::Validation("symbol must not be empty".to_string()));
        }

        let snapshot = self.get(name)?;
        let candidates = snapshot.records_for_symbol(&symbol);
        if candidates.is_empty() {
            return Err(RegistryError::symbol_not_found(symbol));
        }

        match group_key.map(str::trim).filter(|key| !key.is_empty()) {
            Some(key) => candidates
                .into_iter()
                .find(|record| record.group_key == key)
                .cloned()
                .ok_or_else(|| RegistryError::group_not_found(key)),
            None if candidates.len() == 1 => Ok(candidates[0].clone()),
            None => Err(RegistryError::Ambiguous {
                symbol,
                group_keys: candidates
                    .iter()
                    .map(|record| record.group_key.clone())
                    .collect(),
            }),
        }
    }

    /// Removes a registration. Files on disk are left alone.
    pub fn delete(&self, name: &str) -> RegistryResult<Arc<ModelSnapshot>> {
        let name = name.trim();
        let removed = {
            let _guard = self.write_lock.lock();
            let mut next = ModelMap::clone(&self.models.load());
            let removed = next
                .remove(name)
                .ok_or_else(|| RegistryError::model_not_found(name))?;
            self.models.store(Arc::new(next));
            removed
        };
        info!(model = %name, "deleted model registration");

        if let Err(e) = self.store.delete_registered_root(name) {
            warn!(model = %name, error = %e, "registration removal not persisted");
            removed.append_warning(ScanWarning::general(format!(
                "registration removal not persisted: {e}"
            )));
        }
        Ok(removed)
    }

    /// Factor names across all records, first occurrence order.
    pub fn factors(&self, name: &str) -> RegistryResult<Vec<String>> {
        let snapshot = self.get(name)?;
        let mut seen = HashSet::new();
        Ok(snapshot
            .records()
            .iter()
            .flat_map(|record| record.factors.iter())
            .filter(|factor| seen.insert(factor.as_str()))
            .cloned()
            .collect())
    }

    /// Served-model payload for one record, converting on demand when only
    /// a raw model exists and a conversion cache is attached.
    pub fn served_model(
        &self,
        name: &str,
        symbol: &str,
        group_key: Option<&str>,
    ) -> RegistryResult<ServedModel> {
        let record = self.resolve_symbol(name, symbol, group_key)?;
        let mut served = ServedModel {
            model_name: name.trim().to_string(),
            symbol: record.symbol.clone(),
            group_key: record.group_key.clone(),
            feature_dim: record.feature_dim,
            path: None,
            available: false,
            warning: None,
            dim_factors: record.dim_factors.clone(),
        };

        if record.served_available {
            served.path = record.served_model.clone();
            served.available = true;
            return Ok(served);
        }

        let warning = match (&record.raw_model, self.conversion()) {
            (Some(raw), Some(cache)) => match record.fingerprints.get(raw) {
                Some(fingerprint) => match cache.get_or_convert(raw, fingerprint) {
                    Ok(path) => {
                        served.path = Some(path);
                        served.available = true;
                        return Ok(served);
                    }
                    Err(e) => format!("served model unavailable: {e}"),
                },
                None => "served model unavailable: raw model could not be read".to_string(),
            },
            _ => record
                .warnings
                .iter()
                .find(|w| w.starts_with("served model") || w.starts_with("missing model"))
                .cloned()
                .unwrap_or_else(|| "served model unavailable".to_string()),
        };
        served.warning = Some(warning);
        Ok(served)
    }

    /// Clone-and-swap under the write lock.
    fn publish(&self, name: &str, snapshot: Arc<ModelSnapshot>) {
        let _guard = self.write_lock.lock();
        let mut next = ModelMap::clone(&self.models.load());
        next.insert(name.to_string(), snapshot);
        self.models.store(Arc::new(next));
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.names())
            .finish()
    }
}

fn validate_name(name: &str) -> RegistryResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RegistryError::Validation(
            "model name must not be empty".to_string(),
        ));
    }
    Ok(name)
}

fn validate_root(root: &Path) -> RegistryResult<PathBuf> {
    if root.as_os_str().is_empty() || root.to_string_lossy().trim().is_empty() {
        return Err(RegistryError::Validation(
            "model root must not be empty".to_string(),
        ));
    }
    if !root.exists() {
        return Err(RegistryError::Validation(format!(
            "model root {} does not exist",
            root.display()
        )));
    }
    if !root.is_dir() {
        return Err(RegistryError::Validation(format!(
            "model root {} is not a directory",
            root.display()
        )));
    }
    std::fs::canonicalize(root).map_err(|e| RegistryError::scan(root, e))
}

fn already_registered(name: &str) -> RegistryError {
    RegistryError::Validation(format!("model `{name}` is already registered"))
}
