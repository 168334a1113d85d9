//! `modelhub refresh` command implementation

use crate::context::CliContext;
use crate::output::OutputFormat;

/// Execute the `modelhub refresh` command
pub fn run(ctx: &CliContext, name: &str, format: OutputFormat) -> anyhow::Result<()> {
    let before = ctx.registry.get(name)?.generation();
    let snapshot = ctx.registry.refresh(name)?;
    if !format.is_json() && snapshot.generation() == before {
        println!("Refresh failed, showing the previous snapshot");
    }
    super::show::render(&snapshot, snapshot.generation() == before, format)
}
