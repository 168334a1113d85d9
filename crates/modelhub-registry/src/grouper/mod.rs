//! Artifact grouping
//!
//! [`ArtifactGrouper::scan`] walks a model root, buckets artifact files by
//! group key and parses every group into a [`SymbolRecord`]. A broken group
//! only ever produces warnings on itself; the only fatal condition is a root
//! that cannot be read at all.

mod parse;

use crate::conversion::ConversionCache;
use modelhub_kernel::artifact::return_name_of;
use modelhub_kernel::fingerprint::content_digest;
use modelhub_kernel::{
    ArtifactFile, ArtifactKind, DimFactor, Fingerprint, FingerprintMap, ModelMeta, RegistryError,
    RegistryResult, ScanOutcome, ScanWarning, SymbolRecord,
};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

/// Kinds every complete group carries. A model artifact (raw or served)
/// is required on top of these.
const REQUIRED_KINDS: [ArtifactKind; 3] = [
    ArtifactKind::FactorList,
    ArtifactKind::IcTable,
    ArtifactKind::InfoBlob,
];

/// Files found for one group key.
#[derive(Debug, Default)]
struct GroupFiles {
    files: BTreeMap<ArtifactKind, PathBuf>,
    /// Later files for a kind already seen under another directory
    duplicates: Vec<PathBuf>,
}

impl GroupFiles {
    fn has(&self, kind: ArtifactKind) -> bool {
        self.files.contains_key(&kind)
    }
}

/// Scans model roots into records.
#[derive(Default, Clone)]
pub struct ArtifactGrouper {
    conversion: Option<Arc<ConversionCache>>,
}

impl ArtifactGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts raw models without a served counterpart during scans.
    pub fn with_conversion(mut self, cache: Arc<ConversionCache>) -> Self {
        self.conversion = Some(cache);
        self
    }

    pub fn conversion(&self) -> Option<&Arc<ConversionCache>> {
        self.conversion.as_ref()
    }

    /// Scans `root` into records ordered by group key.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Scan`] when `root` is missing, not a directory or
    /// not listable.
    pub fn scan(&self, root: &Path) -> RegistryResult<ScanOutcome> {
        let meta = fs::metadata(root).map_err(|e| RegistryError::scan(root, e))?;
        if !meta.is_dir() {
            return Err(RegistryError::scan(
                root,
                io::Error::new(io::ErrorKind::NotADirectory, "model root is not a directory"),
            ));
        }
        fs::read_dir(root).map_err(|e| RegistryError::scan(root, e))?;

        let mut outcome = ScanOutcome::default();
        let groups = discover(root, &mut outcome);

        for (group_key, group) in groups {
            let record = self.build_record(&group_key, &group);
            debug!(
                group = %group_key,
                warnings = record.warnings.len(),
                served = record.served_available,
                "parsed artifact group"
            );
            outcome
                .fingerprints
                .extend(record.fingerprints.iter().map(|(p, f)| (p.clone(), f.clone())));
            outcome.warnings.extend(
                record
                    .warnings
                    .iter()
                    .map(|w| ScanWarning::for_group(group_key.clone(), w.clone())),
            );
            outcome.records.push(record);
        }

        Ok(outcome)
    }

    fn build_record(&self, group_key: &str, group: &GroupFiles) -> SymbolRecord {
        let symbol = modelhub_kernel::artifact::symbol_of(group_key);
        let mut record = SymbolRecord::new(symbol, group_key);
        let mut warnings: Vec<String> = group
            .duplicates
            .iter()
            .map(|path| format!("duplicate artifact ignored: {}", path.display()))
            .collect();

        let mut factors = None;
        let mut ic = parse::IcRows::default();
        let mut info = parse::InfoBlob::default();
        let mut meta = None;

        for (kind, path) in &group.files {
            let Some(bytes) = read_artifact(*kind, path, &mut record.fingerprints, &mut warnings)
            else {
                continue;
            };
            match kind {
                ArtifactKind::FactorList => factors = Some(parse::factor_list(&bytes, &mut warnings)),
                ArtifactKind::IcTable => ic = parse::ic_table(&bytes, &mut warnings),
                ArtifactKind::InfoBlob => info = parse::info_blob(&bytes, &mut warnings),
                ArtifactKind::ServedModel => meta = parse::model_meta(&bytes, &mut warnings),
                ArtifactKind::RawModel => {}
            }
        }

        for kind in REQUIRED_KINDS {
            if !group.has(kind) {
                warnings.push(format!("missing {}", kind.label()));
            }
        }
        if !group.has(ArtifactKind::RawModel) && !group.has(ArtifactKind::ServedModel) {
            warnings.push("missing model artifact (raw or served)".to_string());
        }

        if let Some(info_symbol) = &info.symbol {
            if !record.matches_symbol(info_symbol) {
                warnings.push(format!(
                    "info blob symbol `{info_symbol}` differs from group symbol `{symbol}`"
                ));
            }
        }

        record.factors = factors.unwrap_or_else(|| info.selected_factors.clone());
        record.return_name = info
            .return_name
            .clone()
            .or_else(|| ic.first_return_name.clone())
            .unwrap_or_else(|| return_name_of(group_key).to_string());
        record.ic = std::mem::take(&mut ic.table);
        record.training = std::mem::take(&mut info.training);
        record.raw_model = group.files.get(&ArtifactKind::RawModel).cloned();

        if let Some(served) = group.files.get(&ArtifactKind::ServedModel) {
            record.served_model = Some(served.clone());
            record.served_available = meta.is_some();
        } else if let Some(raw) = record.raw_model.clone() {
            meta = self.convert_raw(&raw, &mut record, &mut warnings);
        }
        record.model_meta = meta;

        resolve_dimensions(&mut record, &mut warnings);
        record.warnings = warnings;
        record
    }

    /// Produces a served model for `raw` through the conversion cache.
    fn convert_raw(
        &self,
        raw: &Path,
        record: &mut SymbolRecord,
        warnings: &mut Vec<String>,
    ) -> Option<ModelMeta> {
        let Some(cache) = &self.conversion else {
            warnings.push("served model unavailable: no converter configured".to_string());
            return None;
        };
        let Some(fingerprint) = record.fingerprints.get(raw).cloned() else {
            warnings.push("served model unavailable: raw model could not be read".to_string());
            return None;
        };

        let served = match cache.get_or_convert(raw, &fingerprint) {
            Ok(served) => served,
            Err(e) => {
                warnings.push(format!("served model unavailable: {e}"));
                return None;
            }
        };
        let meta = match fs::read(&served) {
            Ok(bytes) => parse::model_meta(&bytes, warnings),
            Err(e) => {
                warnings.push(format!("converted model unreadable: {e}"));
                None
            }
        };
        record.served_available = meta.is_some();
        record.served_model = Some(served);
        meta
    }
}

/// Walks `root` and buckets artifact files by group key. Files whose group
/// key yields no symbol are fingerprinted but not grouped.
fn discover(root: &Path, outcome: &mut ScanOutcome) -> BTreeMap<String, GroupFiles> {
    let mut groups: BTreeMap<String, GroupFiles> = BTreeMap::new();

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                outcome
                    .warnings
                    .push(ScanWarning::general(format!("unreadable entry skipped: {e}")));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(artifact) = ArtifactFile::from_path(entry.path()) else {
            continue;
        };

        if !artifact.has_symbol() {
            outcome.warnings.push(ScanWarning::general(format!(
                "ignoring {}: no symbol in group key",
                artifact.path.display()
            )));
            if let Ok(meta) = entry.metadata() {
                outcome
                    .fingerprints
                    .insert(artifact.path, Fingerprint::from_metadata(&meta));
            }
            continue;
        }

        let group = groups.entry(artifact.group_key).or_default();
        if group.has(artifact.kind) {
            group.duplicates.push(artifact.path);
        } else {
            group.files.insert(artifact.kind, artifact.path);
        }
    }

    groups
}

/// Stats (and for parsed kinds, reads) one artifact, recording its
/// fingerprint. Returns the content for kinds that get parsed.
fn read_artifact(
    kind: ArtifactKind,
    path: &Path,
    fingerprints: &mut FingerprintMap,
    warnings: &mut Vec<String>,
) -> Option<Vec<u8>> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) => {
            warnings.push(format!("cannot stat {kind}: {e}"));
            return None;
        }
    };
    let fingerprint = Fingerprint::from_metadata(&meta);

    if !kind.is_parsed() {
        fingerprints.insert(path.to_path_buf(), fingerprint);
        return None;
    }

    match fs::read(path) {
        Ok(bytes) => {
            fingerprints.insert(path.to_path_buf(), fingerprint.with_digest(content_digest(&bytes)));
            Some(bytes)
        }
        Err(e) => {
            warnings.push(format!("cannot read {kind}: {e}"));
            fingerprints.insert(path.to_path_buf(), fingerprint);
            None
        }
    }
}

/// Feature dimension from the served model, falling back to the factor
/// count, plus the per-dimension factor view.
fn resolve_dimensions(record: &mut SymbolRecord, warnings: &mut Vec<String>) {
    let from_model = record
        .model_meta
        .as_ref()
        .and_then(|meta| meta.num_feature)
        .and_then(|n| usize::try_from(n).ok())
        .filter(|n| *n > 0);
    record.feature_dim = from_model.unwrap_or(record.factors.len());

    if record.feature_dim == 0 {
        warnings.push("feature dimension unresolved".to_string());
    } else if !record.factors.is_empty() && record.factors.len() != record.feature_dim {
        warnings.push(format!(
            "factor count {} does not match feature dimension {}",
            record.factors.len(),
            record.feature_dim
        ));
    }

    record.dim_factors = record
        .factors
        .iter()
        .take(record.feature_dim)
        .enumerate()
        .map(|(dim, name)| DimFactor {
            dim,
            factor_name: name.clone(),
            kendall_tau: record.ic.get(name).and_then(|stat| stat.kendall_tau),
        })
        .collect();
}
