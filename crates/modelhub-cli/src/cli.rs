//! CLI command definitions using clap

use crate::output::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// modelhub - model artifact registry
#[derive(Parser)]
#[command(name = "modelhub")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Configuration file path
    #[arg(short = 'c', long, global = true, env = "MODELHUB_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Load registered roots and keep them fresh until interrupted
    Serve {
        /// Run without the background watcher
        #[arg(long)]
        no_watch: bool,
    },

    /// Scan a directory once without registering it
    Scan {
        /// Model root directory
        root: PathBuf,
    },

    /// Register a model root
    Register {
        /// Model name
        name: String,

        /// Model root directory
        root: PathBuf,
    },

    /// Rescan a registered model
    Refresh {
        /// Model name
        name: String,
    },

    /// Remove a registration (files are left untouched)
    Delete {
        /// Model name
        name: String,
    },

    /// List registered models
    List,

    /// Show the records of a registered model
    Show {
        /// Model name
        name: String,

        /// Also print every warning
        #[arg(short, long)]
        warnings: bool,
    },

    /// Resolve a symbol to one record
    Resolve {
        /// Model name
        name: String,

        /// Trading symbol (case-insensitive)
        symbol: String,

        /// Group key, required when the symbol spans several groups
        #[arg(short, long)]
        group: Option<String>,

        /// Print the served-model payload instead of the record
        #[arg(long)]
        served: bool,
    },

    /// List the factor names used by a model
    Factors {
        /// Model name
        name: String,
    },
}
