//! `modelhub resolve` command implementation

use crate::context::CliContext;
use crate::output::{self, OutputFormat, or_dash};
use modelhub_kernel::SymbolRecord;
use modelhub_registry::ServedModel;

/// Execute the `modelhub resolve` command
pub fn run(
    ctx: &CliContext,
    name: &str,
    symbol: &str,
    group: Option<&str>,
    served: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if served {
        let served = ctx.registry.served_model(name, symbol, group)?;
        return match format {
            OutputFormat::Json => output::print_json(&served),
            OutputFormat::Text => {
                print_served(&served);
                Ok(())
            }
        };
    }

    let record = ctx.registry.resolve_symbol(name, symbol, group)?;
    match format {
        OutputFormat::Json => output::print_json(record.as_ref()),
        OutputFormat::Text => {
            print_record(&record);
            Ok(())
        }
    }
}

fn print_record(record: &SymbolRecord) {
    println!("{} ({})", record.group_key, record.symbol);
    println!("  return:      {}", record.return_name);
    println!("  feature dim: {}", record.feature_dim);
    println!(
        "  training:    {} .. {} ({} samples)",
        or_dash(record.training.start_date.as_deref()),
        or_dash(record.training.end_date.as_deref()),
        or_dash(record.training.samples)
    );
    println!(
        "  served:      {}",
        match (&record.served_model, record.served_available) {
            (Some(path), true) => path.display().to_string(),
            _ => "unavailable".to_string(),
        }
    );

    if !record.dim_factors.is_empty() {
        let mut table = output::table(&["dim", "factor", "kendall tau"]);
        for dim in &record.dim_factors {
            table.add_row(vec![
                dim.dim.to_string(),
                dim.factor_name.clone(),
                or_dash(dim.kendall_tau.map(|t| format!("{t:.4}"))),
            ]);
        }
        println!("{table}");
    }

    for warning in &record.warnings {
        println!("  warning: {warning}");
    }
}

fn print_served(served: &ServedModel) {
    println!("{} ({})", served.group_key, served.symbol);
    println!("  feature dim: {}", served.feature_dim);
    match (&served.path, served.available) {
        (Some(path), true) => println!("  served model: {}", path.display()),
        _ => println!("  served model unavailable"),
    }
    if let Some(warning) = &served.warning {
        println!("  warning: {warning}");
    }
}
