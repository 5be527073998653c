//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod check;
pub mod common;
pub mod inputs;
pub mod pin;
pub mod shell;
pub mod tools;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use crate::cli::GlobalArgs;
use crate::infra::executor::ToolCommand;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the project artifact with the pinned toolchain
    Build {
        /// Publish the artifact into DIR (default: ./result)
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Number of parallel jobs
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Enter the development environment
    #[command(alias = "develop")]
    Shell {
        /// Non-interactive session (hooks guarded by `batch` run)
        #[arg(long)]
        batch: bool,

        /// Run COMMAND in the environment instead of a shell
        #[arg(short = 'c', long = "command", value_name = "COMMAND")]
        command: Option<String>,
    },

    /// Compose the project and show the build plan without building
    Check,

    /// Run the toolchain's formatter
    Fmt {
        /// Only check formatting
        #[arg(long)]
        check: bool,

        /// Extra arguments passed to rustfmt
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Run the toolchain's linter
    Lint {
        /// Extra arguments passed to clippy
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// List pinned inputs
    Inputs,

    /// Pin an input to a new reference
    Pin {
        /// Input name
        name: String,

        /// Local directory (relative to the project)
        #[arg(long, conflicts_with_all = ["git", "channel"])]
        path: Option<PathBuf>,

        /// Repository url
        #[arg(long, requires = "rev", conflicts_with = "channel")]
        git: Option<String>,

        /// Full commit id
        #[arg(long, requires = "git")]
        rev: Option<String>,

        /// Toolchain channel
        #[arg(long, requires = "date")]
        channel: Option<String>,

        /// Toolchain snapshot date (YYYY-MM-DD)
        #[arg(long, requires = "channel")]
        date: Option<String>,

        /// Mark the input as an overlay
        #[arg(long)]
        overlay: bool,

        /// Do not record a content hash
        #[arg(long)]
        no_hash: bool,
    },
}

impl Commands {
    /// Execute the command, returning the process exit code
    pub async fn run(self, global: &GlobalArgs) -> Result<i32> {
        match self {
            Self::Build { out, jobs } => {
                build::execute(global, build::BuildOptions { out, jobs }).await
            }
            Self::Shell { batch, command } => {
                shell::execute(global, shell::ShellOptions { batch, command }).await
            }
            Self::Check => check::execute(global).await,
            Self::Fmt { check, args } => {
                tools::execute(global, ToolCommand::Fmt { check }, args).await
            }
            Self::Lint { args } => tools::execute(global, ToolCommand::Lint, args).await,
            Self::Inputs => inputs::execute(global).await,
            Self::Pin {
                name,
                path,
                git,
                rev,
                channel,
                date,
                overlay,
                no_hash,
            } => {
                let options = pin::PinOptions {
                    name,
                    path,
                    git,
                    rev,
                    channel,
                    date,
                    overlay,
                    no_hash,
                };
                pin::execute(global, options).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from(["pinenv", "-vv", "--json", "-C", "/work", "check"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.json);
        assert_eq!(cli.directory, Some(PathBuf::from("/work")));
        assert!(matches!(cli.command, Some(Commands::Check)));
    }

    #[test]
    fn test_develop_alias() {
        let cli = Cli::try_parse_from(["pinenv", "develop", "--batch", "-c", "true"]).unwrap();
        match cli.command {
            Some(Commands::Shell { batch, command }) => {
                assert!(batch);
                assert_eq!(command.as_deref(), Some("true"));
            }
            other => panic!("Expected shell command, got: {other:?}"),
        }
    }

    #[test]
    fn test_pin_requires_rev_with_git() {
        assert!(Cli::try_parse_from(["pinenv", "pin", "source", "--git", "https://example.com/r"]).is_err());
        assert!(Cli::try_parse_from(["pinenv", "pin", "source", "--path", "app", "--channel", "nightly"]).is_err());
        assert!(Cli::try_parse_from(["pinenv", "pin", "source", "--path", "app"]).is_ok());
    }

    #[test]
    fn test_fmt_passthrough_args() {
        let cli = Cli::try_parse_from(["pinenv", "fmt", "--check", "--", "--edition", "2018"]).unwrap();
        match cli.command {
            Some(Commands::Fmt { check, args }) => {
                assert!(check);
                assert_eq!(args, vec!["--edition", "2018"]);
            }
            other => panic!("Expected fmt command, got: {other:?}"),
        }
    }
}
