//! `modelhub factors` command implementation

use crate::context::CliContext;
use crate::output::{self, OutputFormat};

/// Execute the `modelhub factors` command
pub fn run(ctx: &CliContext, name: &str, format: OutputFormat) -> anyhow::Result<()> {
    let factors = ctx.registry.factors(name)?;
    if format.is_json() {
        return output::print_json(&factors);
    }
    for factor in &factors {
        println!("{factor}");
    }
    Ok(())
}
