//! `modelhub register` command implementation

use crate::context::CliContext;
use crate::output::OutputFormat;
use std::path::Path;

/// Execute the `modelhub register` command
pub fn run(ctx: &CliContext, name: &str, root: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let snapshot = ctx.registry.register(name, root)?;
    if !format.is_json() {
        println!("Registered `{}`", snapshot.model_name());
    }
    super::show::render(&snapshot, false, format)
}
