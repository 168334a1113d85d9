//! `modelhub show` command implementation

use crate::context::CliContext;
use crate::output::{self, OutputFormat};
use modelhub_kernel::ModelSnapshot;

/// Execute the `modelhub show` command
pub fn run(ctx: &CliContext, name: &str, warnings: bool, format: OutputFormat) -> anyhow::Result<()> {
    let snapshot = ctx.registry.get(name)?;
    render(&snapshot, warnings, format)
}

/// Prints a snapshot: header, one row per record, then warnings.
pub fn render(snapshot: &ModelSnapshot, warnings: bool, format: OutputFormat) -> anyhow::Result<()> {
    if format.is_json() {
        return output::print_json(snapshot);
    }

    println!(
        "{} ({}) generation {} scanned {}",
        snapshot.model_name(),
        snapshot.root().display(),
        snapshot.generation(),
        snapshot.scanned_at().to_rfc3339()
    );

    if snapshot.records().is_empty() {
        println!("  No artifact groups found.");
    } else {
        let mut table = output::table(&[
            "group", "symbol", "return", "dim", "factors", "served", "warnings",
        ]);
        for record in snapshot.records() {
            table.add_row(vec![
                record.group_key.clone(),
                record.symbol.clone(),
                record.return_name.clone(),
                record.feature_dim.to_string(),
                record.factors.len().to_string(),
                if record.served_available { "yes" } else { "no" }.to_string(),
                record.warnings.len().to_string(),
            ]);
        }
        println!("{table}");
    }

    let all = snapshot.warnings();
    if all.is_empty() {
        return Ok(());
    }
    if warnings {
        println!("Warnings:");
        for warning in &all {
            println!("  {warning}");
        }
    } else {
        println!("{} warnings (use --warnings to list)", all.len());
    }
    Ok(())
}
