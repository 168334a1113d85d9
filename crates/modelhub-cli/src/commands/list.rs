//! `modelhub list` command implementation

use crate::context::CliContext;
use crate::output::{self, OutputFormat};

/// Execute the `modelhub list` command
pub fn run(ctx: &CliContext, format: OutputFormat) -> anyhow::Result<()> {
    let models = ctx.registry.list();
    if format.is_json() {
        return output::print_json(&models);
    }

    if models.is_empty() {
        println!("No models registered.");
        return Ok(());
    }

    let mut table = output::table(&["name", "symbols", "groups", "warnings", "generation", "root"]);
    for model in &models {
        table.add_row(vec![
            model.name.clone(),
            model.symbol_count.to_string(),
            model.group_count.to_string(),
            model.warning_count.to_string(),
            model.generation.to_string(),
            model.root.display().to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
