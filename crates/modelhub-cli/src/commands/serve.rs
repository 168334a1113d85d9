//! `modelhub serve` command implementation

use crate::context::CliContext;
use crate::output::OutputFormat;
use modelhub_registry::ModelWatcher;
use tracing::info;

/// Execute the `modelhub serve` command
///
/// Keeps the registry loaded and, unless disabled, watches every registered
/// root until Ctrl-C.
pub async fn run(ctx: &CliContext, no_watch: bool, format: OutputFormat) -> anyhow::Result<()> {
    super::list::run(ctx, format)?;

    let watcher = (ctx.config.watch.enabled && !no_watch)
        .then(|| ModelWatcher::start(ctx.registry.clone(), ctx.watcher_config()));
    if watcher.is_none() {
        info!("watcher disabled, registry will only change on explicit refresh");
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    if let Some(watcher) = watcher {
        watcher.shutdown().await;
    }
    Ok(())
}
