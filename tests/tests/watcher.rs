use modelhub_registry::{
    ConversionCache, MemoryRegistrationStore, ModelRegistry, ModelWatcher, WatcherConfig,
};
use modelhub_testing::{ArtifactTree, CountingConverter};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEBOUNCE: Duration = Duration::from_millis(500);

fn config() -> WatcherConfig {
    WatcherConfig::new()
        .with_interval(Duration::from_millis(50))
        .with_debounce(DEBOUNCE)
}

fn registry() -> Arc<ModelRegistry> {
    Arc::new(ModelRegistry::new(Arc::new(MemoryRegistrationStore::new())))
}

async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_burst_of_touches_triggers_one_refresh() {
    let tree = ArtifactTree::new();
    tree.add_group("BTCUSDT_mid_chg_1m");
    let registry = registry();
    registry.register("alpha", tree.root()).unwrap();
    let watcher = ModelWatcher::start(registry.clone(), config());
    tokio::time::sleep(Duration::from_millis(100)).await;

    for _ in 0..3 {
        tree.touch("BTCUSDT_mid_chg_1m_factors.txt");
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
    let last_touch = Instant::now() - Duration::from_millis(150);

    assert!(wait_until(Duration::from_secs(5), || registry.get("alpha").unwrap().generation() == 2).await);
    assert!(last_touch.elapsed() >= DEBOUNCE - Duration::from_millis(50));

    // Nothing else changed, so nothing else runs.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(registry.get("alpha").unwrap().generation(), 2);

    watcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unreadable_root_is_retried_only_after_new_changes() {
    let tree = ArtifactTree::new();
    tree.add_group("BTCUSDT_mid_chg_1m");
    let registry = registry();
    let before = registry.register("alpha", tree.root()).unwrap();
    let watcher = ModelWatcher::start(registry.clone(), config());

    tree.remove_root();
    let failures = || {
        registry
            .get("alpha")
            .unwrap()
            .warnings()
            .iter()
            .filter(|w| w.message.starts_with("refresh failed"))
            .count()
    };
    assert!(wait_until(Duration::from_secs(5), || failures() == 1).await);

    // The failed attempt is not repeated while the root stays missing.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(failures(), 1);
    let current = registry.get("alpha").unwrap();
    assert!(Arc::ptr_eq(&before, &current));
    assert_eq!(current.group_count(), 1);

    std::fs::create_dir(tree.root()).unwrap();
    tree.add_group("BTCUSDT_mid_chg_1m").add_group("ETHUSDT_mid_chg_1m");
    assert!(wait_until(Duration::from_secs(5), || registry.get("alpha").unwrap().group_count() == 2).await);

    watcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_root_does_not_delay_others() {
    let slow = ArtifactTree::new();
    let fast = ArtifactTree::new();
    fast.add_group("BTCUSDT_mid_chg_1m");

    let converter = Arc::new(CountingConverter::new(3).with_delay(Duration::from_millis(1500)));
    let cache = ConversionCache::new(slow.scratch("cache"), converter.clone()).unwrap();
    let registry = Arc::new(
        ModelRegistry::new(Arc::new(MemoryRegistrationStore::new())).with_conversion(Arc::new(cache)),
    );
    registry.register("slow", slow.root()).unwrap();
    registry.register("fast", fast.root()).unwrap();

    let watcher = ModelWatcher::start(
        registry.clone(),
        WatcherConfig::new()
            .with_interval(Duration::from_millis(50))
            .with_debounce(Duration::from_millis(100)),
    );

    slow.add_raw_only_group("ETHUSDT_mid_chg_1m");
    fast.add_group("SOLUSDT_mid_chg_1m");

    assert!(wait_until(Duration::from_secs(5), || registry.get("fast").unwrap().generation() == 2).await);
    assert_eq!(registry.get("slow").unwrap().generation(), 1);

    assert!(wait_until(Duration::from_secs(10), || registry.get("slow").unwrap().generation() == 2).await);
    let record = registry
        .resolve_symbol("slow", "ethusdt", None)
        .unwrap();
    assert!(record.served_available);
    assert_eq!(converter.calls(), 1);

    watcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_request_refresh_wakes_root() {
    let tree = ArtifactTree::new();
    let registry = registry();
    registry.register("alpha", tree.root()).unwrap();
    let watcher = ModelWatcher::start(
        registry.clone(),
        WatcherConfig::new().with_interval(Duration::from_secs(3600)),
    );

    tree.add_group("BTCUSDT_mid_chg_1m");
    assert!(watcher.request_refresh("alpha"));
    assert!(wait_until(Duration::from_secs(5), || registry.get("alpha").unwrap().group_count() == 1).await);
    assert_eq!(watcher.watched_roots().len(), 1);

    watcher.shutdown().await;
}
