//! Hook and shell processes
//!
//! Hooks and the session shell run with exactly the session environment;
//! nothing from the calling process leaks in.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use crate::core::environment::{HookRunner, SessionMode};
use crate::error::EnvironmentError;

/// Runs hook commands with `<shell> -c`
#[derive(Debug, Clone)]
pub struct ShellHookRunner {
    shell: PathBuf,
    /// Working directory of every hook
    cwd: PathBuf,
}

impl ShellHookRunner {
    pub fn new(shell: PathBuf, cwd: PathBuf) -> Self {
        Self { shell, cwd }
    }
}

impl HookRunner for ShellHookRunner {
    fn run(&self, hook: &str, command: &str, env: &BTreeMap<String, String>) -> Result<(), String> {
        tracing::debug!("hook {hook}: {command}");
        let status = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .current_dir(&self.cwd)
            .env_clear()
            .envs(env)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| format!("failed to start {}: {e}", self.shell.display()))?;

        if status.success() {
            Ok(())
        } else {
            Err(match status.code() {
                Some(code) => format!("exited with code {code}"),
                None => "terminated by signal".to_string(),
            })
        }
    }
}

/// Signal that ends a session early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Interrupt,
    Terminate,
    Hangup,
}

impl Termination {
    /// Conventional `128 + signo` exit code
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Hangup => 129,
            Self::Interrupt => 130,
            Self::Terminate => 143,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Hangup => "SIGHUP",
        }
    }
}

/// Termination signals caught for the lifetime of a session
///
/// Once installed, SIGINT, SIGTERM and SIGHUP no longer kill the process;
/// they are delivered through [`SessionSignals::recv`] instead, so hook
/// teardowns still run.
#[derive(Debug)]
pub struct SessionSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SessionSignals {
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    /// Wait for the next signal
    pub async fn recv(&mut self) -> Termination {
        tokio::select! {
            _ = self.interrupt.recv() => Termination::Interrupt,
            _ = self.terminate.recv() => Termination::Terminate,
            _ = self.hangup.recv() => Termination::Hangup,
        }
    }
}

#[cfg(not(unix))]
impl SessionSignals {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the next signal
    pub async fn recv(&mut self) -> Termination {
        // Only Ctrl-C exists here; a failed registration never resolves
        match tokio::signal::ctrl_c().await {
            Ok(()) => Termination::Interrupt,
            Err(_) => std::future::pending().await,
        }
    }
}

/// How the session shell ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellExit {
    /// The shell exited on its own
    Exited(ExitStatus),
    /// pinenv received a signal and killed the shell
    Stopped(Termination),
}

impl ShellExit {
    /// Exit code pinenv reports for this session
    pub fn code(self) -> i32 {
        match self {
            Self::Exited(status) => status_code(status),
            Self::Stopped(signal) => signal.exit_code(),
        }
    }
}

fn status_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    status.code().unwrap_or(1)
}

/// Run the session shell
///
/// Interactive sessions hand the terminal to the shell, which handles
/// Ctrl-C itself. In batch mode Ctrl-C stops the command; SIGTERM and
/// SIGHUP stop the shell in either mode. A stopped shell is killed and
/// reaped before returning, so the caller can still release the session.
pub async fn run_shell(
    shell: &Path,
    mode: SessionMode,
    command: Option<&str>,
    env: &BTreeMap<String, String>,
    cwd: &Path,
    signals: &mut SessionSignals,
) -> Result<ShellExit, EnvironmentError> {
    let spawn_err = |e: std::io::Error| EnvironmentError::ShellSpawn {
        shell: shell.display().to_string(),
        error: e.to_string(),
    };

    let mut cmd = tokio::process::Command::new(shell);
    if let Some(command) = command {
        cmd.arg("-c").arg(command);
    }
    cmd.current_dir(cwd).env_clear().envs(env).kill_on_drop(true);

    let mut child = cmd.spawn().map_err(spawn_err)?;
    loop {
        tokio::select! {
            status = child.wait() => return status.map(ShellExit::Exited).map_err(spawn_err),
            signal = signals.recv() => {
                if signal == Termination::Interrupt && mode == SessionMode::Interactive {
                    tracing::debug!("Ctrl-C left to the interactive shell");
                    continue;
                }
                tracing::info!("Received {}, stopping session shell", signal.name());
                child.kill().await.map_err(spawn_err)?;
                return Ok(ShellExit::Stopped(signal));
            }
        }
    }
}
