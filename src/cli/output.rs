//! Output formatting and progress indicators
//!
//! This module provides utilities for displaying spinners, status lines and
//! JSON output, and for reporting errors with their full cause chain.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

/// How command results are shown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    /// Only errors
    pub quiet: bool,
    /// Machine readable JSON on stdout
    pub json: bool,
    /// `-v` count
    pub verbose: u8,
}

impl OutputConfig {
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Default tracing directive for the verbosity flags
    ///
    /// `RUST_LOG` still takes precedence when set.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            _ => tracing::Level::DEBUG,
        }
    }

    /// Whether human-oriented progress output is shown
    pub fn show_progress(&self) -> bool {
        !self.quiet && !self.json
    }

    /// Spinner for a long operation, hidden when progress is off
    pub fn spinner(&self, message: &str) -> ProgressBar {
        if self.show_progress() {
            create_spinner(message)
        } else {
            ProgressBar::hidden()
        }
    }

    /// Print a status line unless quiet or JSON
    pub fn status(&self, prefix: &str, message: &str) {
        if self.show_progress() {
            println!("{prefix} {message}");
        }
    }

    /// Print `value` as pretty JSON
    pub fn print_json<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// Create a spinner for operations with unknown duration
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.blue} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Print an error and its causes to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}
