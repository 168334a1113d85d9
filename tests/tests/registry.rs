use modelhub_kernel::{RegistryError, ScanWarning};
use modelhub_registry::{JsonRegistrationStore, MemoryRegistrationStore, ModelRegistry};
use modelhub_testing::{ArtifactTree, FailingStore, assert_warning};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

fn registry() -> ModelRegistry {
    ModelRegistry::new(Arc::new(MemoryRegistrationStore::new()))
}

fn group_keys(registry: &ModelRegistry, name: &str) -> Vec<String> {
    registry
        .get(name)
        .unwrap()
        .records()
        .iter()
        .map(|r| r.group_key.clone())
        .collect()
}

#[test]
fn test_register_counts_complete_groups() {
    let tree = ArtifactTree::new();
    tree.add_group("BTCUSDT_mid_chg_1m")
        .add_group("ETHUSDT_mid_chg_1m")
        .add_group("SOLUSDT_close_chg_5m")
        .write("notes.txt", b"not an artifact");
    let registry = registry();

    registry.register("alpha", tree.root()).unwrap();
    let snapshot = registry.get("alpha").unwrap();

    assert_eq!(snapshot.group_count(), 3);
    assert_eq!(snapshot.warning_count(), 0, "{:?}", snapshot.warnings());
    let record = snapshot.record("SOLUSDT_close_chg_5m").unwrap();
    assert_eq!(record.symbol, "SOLUSDT");
    assert_eq!(record.return_name, "close_chg_5m");
    assert_eq!(record.feature_dim, 3);
    assert!(record.served_available);
    assert_eq!(record.dim_factors.len(), 3);
    assert_eq!(record.training.samples, Some(52_000));
}

#[test]
fn test_removing_group_leaves_siblings_untouched() {
    let tree = ArtifactTree::new();
    tree.add_group("BTCUSDT_mid_chg_1m")
        .add_group("ETHUSDT_mid_chg_1m")
        .add_group("SOLUSDT_mid_chg_1m");
    let registry = registry();
    let before = registry.register("alpha", tree.root()).unwrap();

    tree.remove_group("ETHUSDT_mid_chg_1m");
    let after = registry.refresh("alpha").unwrap();

    assert_eq!(group_keys(&registry, "alpha"), vec!["BTCUSDT_mid_chg_1m", "SOLUSDT_mid_chg_1m"]);
    for key in ["BTCUSDT_mid_chg_1m", "SOLUSDT_mid_chg_1m"] {
        assert_eq!(**before.record(key).unwrap(), **after.record(key).unwrap());
    }
}

#[test]
fn test_adding_group_adds_one_record() {
    let tree = ArtifactTree::new();
    tree.add_group("BTCUSDT_mid_chg_1m");
    let registry = registry();
    registry.register("alpha", tree.root()).unwrap();

    tree.add_group("DOGEUSDT_mid_chg_15m");
    let after = registry.refresh("alpha").unwrap();

    assert_eq!(after.group_count(), 2);
    let added = after.record("DOGEUSDT_mid_chg_15m").unwrap();
    assert_eq!(added.symbol, "DOGEUSDT");
    assert_eq!(added.return_name, "mid_chg_15m");
}

#[test]
fn test_failed_refresh_keeps_previous_snapshot() {
    let tree = ArtifactTree::new();
    tree.add_group("BTCUSDT_mid_chg_1m");
    let registry = registry();
    let before = registry.register("alpha", tree.root()).unwrap();

    tree.remove_root();
    let returned = registry.refresh("alpha").unwrap();
    let current = registry.get("alpha").unwrap();

    assert!(Arc::ptr_eq(&before, &returned));
    assert!(Arc::ptr_eq(&before, &current));
    assert_eq!(current.group_count(), 1);
    assert_warning!(current, "refresh failed");
    assert!(current.scan_warnings().is_empty());
}

#[test]
fn test_ambiguous_symbol_needs_group_key() {
    let tree = ArtifactTree::new();
    tree.add_group("BTCUSDT_mid_chg_1m").add_group("BTCUSDT_close_chg_5m");
    let registry = registry();
    registry.register("alpha", tree.root()).unwrap();

    let err = registry.resolve_symbol("alpha", "BTCUSDT", None).unwrap_err();
    assert!(matches!(err, RegistryError::Ambiguous { .. }));
    assert!(err.to_string().contains("BTCUSDT_mid_chg_1m"));

    let record = registry
        .resolve_symbol("alpha", "BTCUSDT", Some("BTCUSDT_mid_chg_1m"))
        .unwrap();
    assert_eq!(record.group_key, "BTCUSDT_mid_chg_1m");
}

#[test]
fn test_corrupt_artifacts_degrade_one_group() {
    let tree = ArtifactTree::new();
    tree.add_group("BTCUSDT_mid_chg_1m")
        .add_group("ETHUSDT_mid_chg_1m")
        .write("ETHUSDT_mid_chg_1m_info.pkl", b"\x00definitely not a pickle")
        .write("ETHUSDT_mid_chg_1m_ic.csv", b"nothing,useful\n1,2\n");
    let registry = registry();
    let snapshot = registry.register("alpha", tree.root()).unwrap();

    assert_eq!(snapshot.group_count(), 2);
    assert!(snapshot.record("BTCUSDT_mid_chg_1m").unwrap().warnings.is_empty());
    let degraded = snapshot.record("ETHUSDT_mid_chg_1m").unwrap();
    assert!(degraded.is_degraded());
    assert!(degraded.warnings.iter().any(|w| w.starts_with("info blob")));
    assert!(degraded.warnings.iter().any(|w| w.starts_with("IC table")));
    // The factor list is still usable.
    assert_eq!(degraded.factors.len(), 3);
}

#[test]
fn test_persistence_failure_keeps_registration() {
    let tree = ArtifactTree::new();
    tree.add_group("BTCUSDT_mid_chg_1m");
    let registry = ModelRegistry::new(Arc::new(FailingStore));

    registry.register("alpha", tree.root()).unwrap();
    let snapshot = registry.get("alpha").unwrap();
    assert_eq!(snapshot.group_count(), 1);
    assert_warning!(snapshot, "registration not persisted");
}

#[test]
fn test_registrations_reload_from_json_store() {
    let tree = ArtifactTree::new();
    tree.add_group("BTCUSDT_mid_chg_1m");
    let store_dir = tree.scratch("registrations");

    {
        let store = JsonRegistrationStore::new(&store_dir).unwrap();
        let registry = ModelRegistry::new(Arc::new(store));
        registry.register("alpha", tree.root()).unwrap();
        registry.register("beta", tree.root()).unwrap();
        registry.delete("beta").unwrap();
    }

    let registry = ModelRegistry::new(Arc::new(JsonRegistrationStore::new(&store_dir).unwrap()));
    assert_eq!(registry.warmup().unwrap(), 1);
    assert_eq!(registry.names(), vec!["alpha"]);
    assert_eq!(registry.get("alpha").unwrap().group_count(), 1);
}

#[test]
fn test_warmup_keeps_unreadable_roots_listed() {
    let tree = ArtifactTree::new();
    tree.add_group("BTCUSDT_mid_chg_1m");
    let store_dir = tree.scratch("registrations");
    {
        let registry = ModelRegistry::new(Arc::new(JsonRegistrationStore::new(&store_dir).unwrap()));
        registry.register("alpha", tree.root()).unwrap();
    }
    tree.remove_root();

    let registry = ModelRegistry::new(Arc::new(JsonRegistrationStore::new(&store_dir).unwrap()));
    assert_eq!(registry.warmup().unwrap(), 1);
    let placeholder = registry.get("alpha").unwrap();
    assert_eq!(placeholder.group_count(), 0);
    assert_warning!(placeholder, "scan failed");

    // Once the root is back, a refresh publishes real content.
    std::fs::create_dir(tree.root()).unwrap();
    tree.add_group("BTCUSDT_mid_chg_1m");
    let refreshed = registry.refresh("alpha").unwrap();
    assert_eq!(refreshed.group_count(), 1);
    assert_eq!(refreshed.generation(), 2);
}

#[test]
fn test_readers_never_see_torn_snapshots() {
    let tree = ArtifactTree::new();
    tree.add_group("BTCUSDT_mid_chg_1m").add_group("ETHUSDT_mid_chg_1m");
    let registry = Arc::new(registry());
    registry.register("alpha", tree.root()).unwrap();

    let small: BTreeSet<String> = ["BTCUSDT_mid_chg_1m", "ETHUSDT_mid_chg_1m"]
        .into_iter()
        .map(String::from)
        .collect();
    let mut large = small.clone();
    large.insert("SOLUSDT_mid_chg_1m".to_string());

    let stop = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            let stop = stop.clone();
            let (small, large) = (small.clone(), large.clone());
            thread::spawn(move || {
                let mut reads = 0usize;
                while !stop.load(Ordering::Relaxed) {
                    let snapshot = registry.get("alpha").unwrap();
                    let keys: BTreeSet<String> =
                        snapshot.records().iter().map(|r| r.group_key.clone()).collect();
                    assert!(keys == small || keys == large, "torn snapshot: {keys:?}");
                    assert_eq!(snapshot.group_count(), keys.len());
                    assert_eq!(snapshot.summary().group_count, keys.len());
                    for record in snapshot.records() {
                        assert!(!record.factors.is_empty());
                    }
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    for i in 0..20 {
        if i % 2 == 0 {
            tree.add_group("SOLUSDT_mid_chg_1m");
        } else {
            tree.remove_group("SOLUSDT_mid_chg_1m");
        }
        registry.refresh("alpha").unwrap();
    }
    stop.store(true, Ordering::Relaxed);

    let total: usize = readers.into_iter().map(|r| r.join().unwrap()).sum();
    assert!(total > 0);
    assert_eq!(registry.get("alpha").unwrap().generation(), 21);
}

#[test]
fn test_degradation_log_is_append_only() {
    let tree = ArtifactTree::new();
    tree.add_group("BTCUSDT_mid_chg_1m");
    let registry = registry();
    let snapshot = registry.register("alpha", tree.root()).unwrap();

    snapshot.append_warning(ScanWarning::general("first"));
    snapshot.append_warning(ScanWarning::general("second"));
    let messages: Vec<String> = snapshot.warnings().iter().map(|w| w.message.clone()).collect();
    assert_eq!(messages, vec!["first", "second"]);
    assert_eq!(registry.list()[0].warning_count, 2);
}
