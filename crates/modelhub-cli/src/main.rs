//! modelhub CLI - register, inspect and watch model artifact roots

mod cli;
mod commands;
mod context;
mod logging;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use context::CliContext;
use modelhub_kernel::config::ModelHubConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ModelHubConfig::load(cli.config.as_deref())?;
    logging::init(&config.logging, cli.verbose);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_command(cli, config))
}

async fn run_command(cli: Cli, config: ModelHubConfig) -> anyhow::Result<()> {
    let format = cli.output;

    // Scanning an arbitrary directory needs no registrations.
    if let Commands::Scan { root } = &cli.command {
        return commands::scan::run(root, format);
    }

    let ctx = CliContext::new(config)?;
    ctx.warmup()?;

    match cli.command {
        Commands::Serve { no_watch } => commands::serve::run(&ctx, no_watch, format).await,
        Commands::Scan { root } => commands::scan::run(&root, format),
        Commands::Register { name, root } => commands::register::run(&ctx, &name, &root, format),
        Commands::Refresh { name } => commands::refresh::run(&ctx, &name, format),
        Commands::Delete { name } => commands::delete::run(&ctx, &name, format),
        Commands::List => commands::list::run(&ctx, format),
        Commands::Show { name, warnings } => commands::show::run(&ctx, &name, warnings, format),
        Commands::Resolve {
            name,
            symbol,
            group,
            served,
        } => commands::resolve::run(&ctx, &name, &symbol, group.as_deref(), served, format),
        Commands::Factors { name } => commands::factors::run(&ctx, &name, format),
    }
}
