//! Shell command implementation
//!
//! Implements `pinenv shell` (alias `develop`): enter the project's
//! environment, run its hooks and spawn the configured shell. Hook
//! teardowns run when the shell exits, and also when pinenv is stopped by
//! SIGTERM, SIGHUP or (in batch mode) Ctrl-C.

use anyhow::{Context, Result};
use std::collections::BTreeMap;

use super::common;
use crate::cli::output::status;
use crate::cli::GlobalArgs;
use crate::core::environment::{self, SessionMode};
use crate::error::EnvironmentError;
use crate::infra::hooks::{self, SessionSignals, ShellHookRunner};

/// Shell options
#[derive(Debug, Default)]
pub struct ShellOptions {
    /// Non-interactive session
    pub batch: bool,
    /// Command to run instead of an interactive shell
    pub command: Option<String>,
}

/// Execute the shell command
///
/// Returns the shell's exit code.
pub async fn execute(global: &GlobalArgs, options: ShellOptions) -> Result<i32> {
    let composed = common::compose(global).await?;
    let manifest = &composed.project.manifest;
    let descriptor = composed.composition.environment(manifest)?;

    let mode = if options.batch || options.command.is_some() {
        SessionMode::Batch
    } else {
        SessionMode::Interactive
    };
    let program = manifest.shell_program();
    let shell = which::which(&program).map_err(|e| EnvironmentError::ShellSpawn {
        shell: program.clone(),
        error: e.to_string(),
    })?;
    let cwd = composed.project.root.clone();
    let runner = ShellHookRunner::new(shell.clone(), cwd.clone());

    // Before any hook runs, so no signal can skip the teardowns
    let mut signals = SessionSignals::install().context("Failed to install signal handlers")?;

    let base: BTreeMap<String, String> = std::env::vars().collect();
    let entry_descriptor = descriptor.clone();
    let mut entry = tokio::task::spawn_blocking(move || {
        environment::enter(&entry_descriptor, mode, &base, runner)
    });
    let mut stopped = None;
    let entered = loop {
        tokio::select! {
            joined = &mut entry => break joined,
            signal = signals.recv(), if stopped.is_none() => {
                tracing::info!("Received {} while entering, leaving once hooks finish", signal.name());
                stopped = Some(signal);
            }
        }
    };
    let session = entered
        .context("Hook runner task failed")?
        .with_context(|| format!("Failed to enter environment of {}", descriptor.name))?;

    if let Some(signal) = stopped {
        session.release().context("Failed to tear down environment")?;
        return Ok(signal.exit_code());
    }

    if mode == SessionMode::Interactive {
        global.output.status(
            status::INFO,
            &format!(
                "Entering {} ({}); exit the shell to leave",
                descriptor.name,
                descriptor.toolchain.id()
            ),
        );
    }

    let result = hooks::run_shell(
        &shell,
        mode,
        options.command.as_deref(),
        session.env(),
        &cwd,
        &mut signals,
    )
    .await;
    session.release().context("Failed to tear down environment")?;

    Ok(result?.code())
}
