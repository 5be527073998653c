//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use commands::Commands;
use output::OutputConfig;

/// pinenv - pinned, reproducible builds and development shells
///
/// Resolves pinned inputs, an exact toolchain snapshot and package overlays
/// into one build plan, then builds the artifact or enters a shell with the
/// same dependencies.
#[derive(Parser, Debug)]
#[command(name = "pinenv")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Run as if started in DIR
    #[arg(short = 'C', long = "directory", value_name = "DIR", global = true)]
    pub directory: Option<PathBuf>,

    /// Never contact the dist server
    #[arg(long, global = true, env = "PINENV_OFFLINE")]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options shared by every command
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    /// Project directory
    pub project_dir: PathBuf,
    pub output: OutputConfig,
    pub offline: bool,
}

impl Cli {
    /// Output settings from the global flags
    pub fn output_config(&self) -> OutputConfig {
        OutputConfig::new(self.quiet, self.json, self.verbose)
    }

    /// Execute the CLI command
    ///
    /// Returns the process exit code.
    pub async fn run(self) -> Result<i32> {
        let project_dir = match &self.directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        let global = GlobalArgs {
            project_dir,
            output: self.output_config(),
            offline: self.offline,
        };

        if let Some(cmd) = self.command {
            cmd.run(&global).await
        } else {
            // No subcommand provided, show help
            use clap::CommandFactory;
            let mut cmd = Self::command();
            cmd.print_help()?;
            Ok(0)
        }
    }
}
