//! Filesystem drift watcher
//!
//! One tokio task per registered root polls on a fixed interval, diffs the
//! current file fingerprints against the published snapshot and drives a
//! [`RootWatch`] state machine. Fingerprinting and refreshes run on the
//! blocking pool, so a slow root never stalls the others. A supervisor task
//! keeps the set of root tasks in line with the registry.

mod state;

pub use state::{RootWatch, WatchAction, WatchPhase};

use crate::fingerprint::FingerprintIndex;
use crate::registry::ModelRegistry;
use dashmap::DashMap;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const WAKE_CAPACITY: usize = 8;
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Watcher timing configuration
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Poll interval per root
    pub interval: Duration,
    /// Quiet period required before a refresh
    pub debounce: Duration,
    /// Refreshes running longer than this are logged
    pub refresh_timeout: Duration,
    /// Use filesystem notifications as early-poll hints
    pub fs_events: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            debounce: Duration::from_secs(2),
            refresh_timeout: Duration::from_secs(120),
            fs_events: false,
        }
    }
}

impl WatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn with_fs_events(mut self, enabled: bool) -> Self {
        self.fs_events = enabled;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    /// Explicit refresh request
    Manual,
    /// Filesystem event under the root
    Hint,
}

struct RootHandle {
    root: PathBuf,
    wake_tx: mpsc::Sender<Wake>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Background watcher over every root in a [`ModelRegistry`].
pub struct ModelWatcher {
    registry: Arc<ModelRegistry>,
    config: WatcherConfig,
    roots: Arc<DashMap<String, RootHandle>>,
    cancel: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    fs_watcher: Mutex<Option<RecommendedWatcher>>,
}

impl ModelWatcher {
    /// Starts watching. Must be called from within a tokio runtime.
    pub fn start(registry: Arc<ModelRegistry>, config: WatcherConfig) -> Arc<Self> {
        let watcher = Arc::new(Self {
            registry,
            config,
            roots: Arc::new(DashMap::new()),
            cancel: CancellationToken::new(),
            supervisor: Mutex::new(None),
            fs_watcher: Mutex::new(None),
        });

        if watcher.config.fs_events {
            match watcher.build_fs_watcher() {
                Ok(fs) => *watcher.fs_watcher.lock() = Some(fs),
                Err(e) => warn!(error = %e, "filesystem events unavailable, polling only"),
            }
        }

        watcher.sync_roots();

        let supervisor = {
            let weak = Arc::downgrade(&watcher);
            let cancel = watcher.cancel.clone();
            let mut ticker = tokio::time::interval(watcher.config.interval.max(MIN_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            let Some(watcher) = weak.upgrade() else { break };
                            watcher.sync_roots();
                        }
                    }
                }
                debug!("watch supervisor stopped");
            })
        };
        *watcher.supervisor.lock() = Some(supervisor);

        info!(
            interval_ms = watcher.config.interval.as_millis() as u64,
            debounce_ms = watcher.config.debounce.as_millis() as u64,
            fs_events = watcher.fs_watcher.lock().is_some(),
            "model watcher started"
        );
        watcher
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Roots currently being watched, ordered by model name.
    pub fn watched_roots(&self) -> Vec<(String, PathBuf)> {
        let mut roots: Vec<_> = self
            .roots
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().root.clone()))
            .collect();
        roots.sort();
        roots
    }

    /// Asks the root task for `name` to refresh now. Duplicate requests
    /// coalesce. Returns `false` if the model is not registered.
    pub fn request_refresh(&self, name: &str) -> bool {
        if !self.roots.contains_key(name) {
            self.sync_roots();
        }
        let Some(handle) = self.roots.get(name) else {
            return false;
        };
        match handle.wake_tx.try_send(Wake::Manual) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Reconciles root tasks with the registry: starts tasks for new models,
    /// cancels tasks for deleted ones and restarts tasks whose root moved.
    pub fn sync_roots(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        let current: BTreeMap<String, PathBuf> = self
            .registry
            .list()
            .into_iter()
            .map(|summary| (summary.name, summary.root))
            .collect();

        let stale: Vec<String> = self
            .roots
            .iter()
            .filter(|entry| current.get(entry.key()) != Some(&entry.value().root))
            .map(|entry| entry.key().clone())
            .collect();
        for name in stale {
            if let Some((_, handle)) = self.roots.remove(&name) {
                handle.cancel.cancel();
                self.unwatch_path(&handle.root);
                debug!(model = %name, "stopped watching root");
            }
        }

        for (name, root) in current {
            if !self.roots.contains_key(&name) {
                self.spawn_root(name, root);
            }
        }
    }

    /// Stops every task and waits for them to exit. In-flight refreshes run
    /// to completion on the blocking pool.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.fs_watcher.lock().take();

        let supervisor = self.supervisor.lock().take();
        if let Some(task) = supervisor {
            let _ = task.await;
        }

        let names: Vec<String> = self.roots.iter().map(|e| e.key().clone()).collect();
        for name in names {
            if let Some((_, handle)) = self.roots.remove(&name) {
                let _ = handle.task.await;
            }
        }
        info!("model watcher stopped");
    }

    fn spawn_root(&self, name: String, root: PathBuf) {
        let (wake_tx, wake_rx) = mpsc::channel(WAKE_CAPACITY);
        let cancel = self.cancel.child_token();
        let task = RootTask {
            name: name.clone(),
            registry: self.registry.clone(),
            config: self.config.clone(),
            state: RootWatch::new(self.config.debounce),
        };
        let handle = tokio::spawn(task.run(wake_rx, cancel.clone()));

        self.watch_path(&root);
        debug!(model = %name, root = %root.display(), "watching root");
        self.roots.insert(
            name,
            RootHandle {
                root,
                wake_tx,
                cancel,
                task: handle,
            },
        );
    }

    fn build_fs_watcher(&self) -> notify::Result<RecommendedWatcher> {
        let roots = self.roots.clone();
        RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let Ok(event) = result else { return };
                for entry in roots.iter() {
                    if event.paths.iter().any(|p| p.starts_with(&entry.value().root)) {
                        let _ = entry.value().wake_tx.try_send(Wake::Hint);
                    }
                }
            },
            Config::default(),
        )
    }

    fn watch_path(&self, root: &Path) {
        if let Some(fs) = self.fs_watcher.lock().as_mut() {
            if let Err(e) = fs.watch(root, RecursiveMode::Recursive) {
                debug!(root = %root.display(), error = %e, "no filesystem events for root");
            }
        }
    }

    fn unwatch_path(&self, root: &Path) {
        if let Some(fs) = self.fs_watcher.lock().as_mut() {
            let _ = fs.unwatch(root);
        }
    }
}

impl Drop for ModelWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct RootTask {
    name: String,
    registry: Arc<ModelRegistry>,
    config: WatcherConfig,
    state: RootWatch,
}

impl RootTask {
    async fn run(mut self, mut wake_rx: mpsc::Receiver<Wake>, cancel: CancellationToken) {
        let (done_tx, mut done_rx) = mpsc::channel::<Option<String>>(1);
        let mut ticker = tokio::time::interval(self.config.interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let deadline = self.state.deadline().map(Instant::from_std);
            let action = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.poll().await,
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.poll().await
                }
                Some(wake) = wake_rx.recv() => match wake {
                    Wake::Manual => self.state.request(Instant::now().into_std()),
                    Wake::Hint => self.poll().await,
                },
                Some(signature) = done_rx.recv() => {
                    self.state.complete(signature);
                    WatchAction::None
                }
            };

            if action == WatchAction::Refresh {
                self.spawn_refresh(done_tx.clone());
            }
        }
        debug!(model = %self.name, "root watch stopped");
    }

    /// Fingerprints the root and feeds the result to the state machine.
    async fn poll(&mut self) -> WatchAction {
        if self.state.is_busy() {
            return WatchAction::None;
        }
        let Ok(snapshot) = self.registry.get(&self.name) else {
            return WatchAction::None;
        };

        let scan = tokio::task::spawn_blocking(move || {
            let state = FingerprintIndex::capture(snapshot.root());
            let diff = FingerprintIndex::diff(snapshot.fingerprints(), &state);
            (state, diff)
        })
        .await;
        let (state, diff) = match scan {
            Ok(result) => result,
            Err(e) => {
                warn!(model = %self.name, error = %e, "fingerprint task failed");
                return WatchAction::None;
            }
        };

        if !diff.is_empty() {
            debug!(
                model = %self.name,
                added = diff.added.len(),
                removed = diff.removed.len(),
                changed = diff.changed.len(),
                "root drift observed"
            );
        }
        self.state
            .observe(Instant::now().into_std(), !diff.is_empty(), &state.signature)
    }

    fn spawn_refresh(&self, done_tx: mpsc::Sender<Option<String>>) {
        let registry = self.registry.clone();
        let name = self.name.clone();
        let timeout = self.config.refresh_timeout;

        tokio::spawn(async move {
            let started = Instant::now();
            let mut job = {
                let name = name.clone();
                tokio::task::spawn_blocking(move || refresh_root(&registry, &name))
            };
            let joined = match tokio::time::timeout(timeout, &mut job).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(model = %name, timeout_secs = timeout.as_secs(), "refresh still running past timeout");
                    job.await
                }
            };
            let signature = match joined {
                Ok(signature) => signature,
                Err(e) => {
                    warn!(model = %name, error = %e, "refresh task failed");
                    None
                }
            };
            debug!(model = %name, elapsed_ms = started.elapsed().as_millis() as u64, "refresh finished");
            let _ = done_tx.send(signature).await;
        });
    }
}

/// Blocking refresh. Returns the root signature captured before the rescan.
fn refresh_root(registry: &ModelRegistry, name: &str) -> Option<String> {
    let before = registry.get(name).ok()?;
    let signature = FingerprintIndex::capture(before.root()).signature;

    match registry.refresh(name) {
        Ok(after) if Arc::ptr_eq(&before, &after) => {
            warn!(model = %name, "refresh failed, previous snapshot retained");
        }
        Ok(after) => {
            info!(
                model = %name,
                generation = after.generation(),
                groups = after.group_count(),
                warnings = after.warning_count(),
                "watcher refreshed model"
            );
        }
        Err(e) => warn!(model = %name, error = %e, "refresh failed"),
    }
    Some(signature)
}
