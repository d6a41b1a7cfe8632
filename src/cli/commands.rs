//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// iNaturalist observation harvester CLI
#[derive(Parser, Debug)]
#[command(name = "inat-harvest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Harvest configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the harvest to exhaustion, resuming from a checkpoint if present
    Run {
        /// Override the configured start page
        #[arg(long)]
        start_page: Option<u32>,

        /// Skip the authenticated session login even if credentials are configured
        #[arg(long)]
        no_login: bool,
    },

    /// Show checkpoint and database state without fetching anything
    Status,

    /// Delete the checkpoint so the next run starts fresh
    Reset {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Validate the configuration file
    Validate,
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Pretty,
    /// JSON output
    Json,
}
