//! CLI context wiring configuration to the registry

use anyhow::Context;
use modelhub_kernel::config::ModelHubConfig;
use modelhub_registry::{
    CommandConverter, ConversionCache, JsonRegistrationStore, ModelRegistry, WatcherConfig,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared state for CLI commands
pub struct CliContext {
    pub config: ModelHubConfig,
    pub registry: Arc<ModelRegistry>,
}

impl CliContext {
    /// Opens the registration store and builds the registry. Registered
    /// roots are not loaded; call [`warmup`](Self::warmup) for that.
    pub fn new(config: ModelHubConfig) -> anyhow::Result<Self> {
        let registrations = config.storage.registrations_dir();
        let store = JsonRegistrationStore::new(&registrations).with_context(|| {
            format!("failed to open registration store at {}", registrations.display())
        })?;
        debug!(dir = %registrations.display(), "registration store opened");

        let mut registry = ModelRegistry::new(Arc::new(store));
        if let Some(cache) = build_conversion(&config)? {
            registry = registry.with_conversion(Arc::new(cache));
        }

        Ok(Self {
            config,
            registry: Arc::new(registry),
        })
    }

    /// Publishes every persisted registration.
    pub fn warmup(&self) -> anyhow::Result<usize> {
        self.registry
            .warmup()
            .context("failed to load registered roots")
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        let watch = &self.config.watch;
        WatcherConfig::new()
            .with_interval(watch.interval())
            .with_debounce(watch.debounce())
            .with_refresh_timeout(watch.refresh_timeout())
            .with_fs_events(watch.fs_events)
    }
}

fn build_conversion(config: &ModelHubConfig) -> anyhow::Result<Option<ConversionCache>> {
    let settings = &config.conversion;
    if !settings.enabled {
        return Ok(None);
    }
    let Some(converter) = CommandConverter::from_template(&settings.command) else {
        warn!("conversion enabled but `conversion.command` is empty, raw models will stay unconverted");
        return Ok(None);
    };
    let converter = converter
        .with_extension(settings.extension.clone())
        .with_timeout(settings.timeout());

    let dir = settings.cache_dir(&config.storage);
    let cache = ConversionCache::new(&dir, Arc::new(converter))
        .with_context(|| format!("failed to open conversion cache at {}", dir.display()))?;
    info!(dir = %dir.display(), "conversion cache ready");
    Ok(Some(cache))
}
