//! `modelhub delete` command implementation

use crate::context::CliContext;
use crate::output::{self, OutputFormat};
use serde_json::json;

/// Execute the `modelhub delete` command
pub fn run(ctx: &CliContext, name: &str, format: OutputFormat) -> anyhow::Result<()> {
    let removed = ctx.registry.delete(name)?;
    if format.is_json() {
        return output::print_json(&json!({
            "deleted": removed.model_name(),
            "root": removed.root(),
            "warnings": removed.warnings().iter().map(ToString::to_string).collect::<Vec<_>>(),
        }));
    }

    println!(
        "Deleted `{}` (files under {} were not touched)",
        removed.model_name(),
        removed.root().display()
    );
    Ok(())
}
