//! CLI module
//!
//! Command-line interface for driving harvest runs.
//!
//! # Commands
//!
//! - `run` - Run the harvest to exhaustion (resumes if a checkpoint exists)
//! - `status` - Show checkpoint and database state
//! - `reset` - Delete the checkpoint
//! - `validate` - Validate the configuration file

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::{fatal_guidance, Runner};
