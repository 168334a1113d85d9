use modelhub_registry::{ConversionCache, MemoryRegistrationStore, ModelRegistry};
use modelhub_testing::{ArtifactTree, CountingConverter, FailingConverter, assert_warning};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn setup(tree: &ArtifactTree, converter: Arc<CountingConverter>) -> ModelRegistry {
    let cache = ConversionCache::new(tree.scratch("converted"), converter).unwrap();
    ModelRegistry::new(Arc::new(MemoryRegistrationStore::new())).with_conversion(Arc::new(cache))
}

#[test]
fn test_unchanged_raw_model_converts_once() {
    let tree = ArtifactTree::new();
    tree.add_raw_only_group("BTCUSDT_mid_chg_1m");
    let converter = Arc::new(CountingConverter::new(3));
    let registry = setup(&tree, converter.clone());

    let snapshot = registry.register("alpha", tree.root()).unwrap();
    let record = snapshot.record("BTCUSDT_mid_chg_1m").unwrap();
    assert!(record.served_available);
    assert_eq!(record.model_meta.as_ref().unwrap().num_feature, Some(3));

    registry.refresh("alpha").unwrap();
    let served = registry.served_model("alpha", "BTCUSDT", None).unwrap();
    assert!(served.available);
    assert!(served.path.unwrap().starts_with(tree.scratch("converted")));
    assert_eq!(converter.calls(), 1);

    tree.touch("BTCUSDT_mid_chg_1m_model.pkl");
    registry.refresh("alpha").unwrap();
    assert_eq!(converter.calls(), 2);
}

#[test]
fn test_concurrent_served_model_requests_share_conversion() {
    let tree = ArtifactTree::new();
    let converter = Arc::new(CountingConverter::new(3).with_delay(Duration::from_millis(200)));
    let registry = Arc::new(setup(&tree, converter.clone()));
    registry.register("alpha", tree.root()).unwrap();

    // Written after registration, so nothing has been converted yet.
    tree.add_raw_only_group("BTCUSDT_mid_chg_1m");
    let cache = registry.conversion().unwrap().clone();
    let raw = tree.root().join("BTCUSDT_mid_chg_1m_model.pkl");
    let fingerprint = modelhub_kernel::Fingerprint::from_metadata(&std::fs::metadata(&raw).unwrap());

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let cache = cache.clone();
            let raw = raw.clone();
            let fingerprint = fingerprint.clone();
            thread::spawn(move || cache.get_or_convert(&raw, &fingerprint).unwrap())
        })
        .collect();
    let paths: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(paths.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(converter.calls(), 1);
}

#[test]
fn test_served_model_without_converter_reports_warning() {
    let tree = ArtifactTree::new();
    tree.add_raw_only_group("BTCUSDT_mid_chg_1m");
    let registry = ModelRegistry::new(Arc::new(MemoryRegistrationStore::new()));
    registry.register("alpha", tree.root()).unwrap();

    let served = registry.served_model("alpha", "btcusdt", None).unwrap();
    assert!(!served.available);
    assert!(served.path.is_none());
    assert!(served.warning.unwrap().contains("no converter configured"));
    assert_eq!(served.feature_dim, 3);
    assert_eq!(served.dim_factors.len(), 3);
}

#[test]
fn test_failed_conversion_degrades_only_its_record() {
    let tree = ArtifactTree::new();
    tree.add_raw_only_group("BTCUSDT_mid_chg_1m")
        .add_group("ETHUSDT_mid_chg_1m");
    let converter = Arc::new(FailingConverter::new());
    let cache = ConversionCache::new(tree.scratch("converted"), converter.clone()).unwrap();
    let registry = ModelRegistry::new(Arc::new(MemoryRegistrationStore::new()))
        .with_conversion(Arc::new(cache));

    let snapshot = registry.register("alpha", tree.root()).unwrap();
    assert_eq!(snapshot.group_count(), 2);
    assert_eq!(converter.calls(), 1);
    assert_warning!(snapshot, "unsupported booster version");

    let degraded = snapshot.record("BTCUSDT_mid_chg_1m").unwrap();
    assert!(!degraded.served_available);
    assert!(degraded.served_model.is_none());
    assert!(degraded.raw_model.is_some());
    assert!(
        degraded
            .warnings
            .iter()
            .any(|w| w.starts_with("served model unavailable") && w.contains("failing")),
        "{:?}",
        degraded.warnings
    );
    assert_eq!(degraded.feature_dim, 3);

    let intact = snapshot.record("ETHUSDT_mid_chg_1m").unwrap();
    assert!(intact.served_available);
    assert!(intact.warnings.is_empty(), "{:?}", intact.warnings);

    let served = registry.served_model("alpha", "BTCUSDT", None).unwrap();
    assert!(!served.available);
    assert!(served.warning.unwrap().contains("unsupported booster version"));
    assert_eq!(converter.calls(), 2);
}
