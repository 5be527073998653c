//! Build plan execution
//!
//! Runs the toolchain's `cargo` against the materialized source tree with an
//! environment derived only from the plan, classifies failures from the
//! tool's diagnostics and publishes the artifact atomically.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use tracing::{debug, info};

use crate::core::build_env::BuildEnvironment;
use crate::core::diagnostics;
use crate::core::plan::BuildPlan;
use crate::error::BuildError;
use crate::infra::native;
use crate::infra::publish::{Artifact, StagedArtifact};

/// Where the build runs and publishes
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// cargo target directory
    pub target_dir: PathBuf,
    /// Directory the artifact is published into
    pub out_dir: PathBuf,
    pub jobs: usize,
}

/// Toolchain subcommands run against the plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCommand {
    /// `cargo fmt`, optionally in check mode
    Fmt { check: bool },
    /// `cargo clippy`
    Lint,
}

impl ToolCommand {
    /// Toolchain component providing the subcommand
    pub fn component(&self) -> &'static str {
        match self {
            Self::Fmt { .. } => "rustfmt",
            Self::Lint => "clippy",
        }
    }

    /// Binary cargo dispatches to
    fn binary(&self) -> &'static str {
        match self {
            Self::Fmt { .. } => "cargo-fmt",
            Self::Lint => "cargo-clippy",
        }
    }

    fn args(&self, plan: &BuildPlan, extra: &[String]) -> Vec<String> {
        let manifest = plan.manifest_path().display().to_string();
        let mut args = match self {
            Self::Fmt { .. } => vec!["fmt".to_string(), "--manifest-path".to_string(), manifest],
            Self::Lint => vec![
                "clippy".to_string(),
                "--target".to_string(),
                plan.toolchain.target.clone(),
                "--manifest-path".to_string(),
                manifest,
            ],
        };

        let mut trailing: Vec<String> = Vec::new();
        if let Self::Fmt { check: true } = self {
            trailing.push("--check".to_string());
        }
        trailing.extend(extra.iter().cloned());
        if !trailing.is_empty() {
            args.push("--".to_string());
            args.extend(trailing);
        }
        args
    }
}

/// Fail with the first declared native library that cannot be found
fn preflight(plan: &BuildPlan) -> Result<(), BuildError> {
    if let Some(missing) = native::missing_libraries(&plan.dependencies).into_iter().next() {
        let searched = missing
            .searched
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(BuildError::MissingNativeLibrary {
            library: missing.library,
            package: Some(missing.package),
            diagnostics: format!("searched: {searched}"),
        });
    }
    Ok(())
}

fn require_tool(tool: &str, path: &Path) -> Result<(), BuildError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(BuildError::ToolNotFound {
            tool: tool.to_string(),
            path: path.to_path_buf(),
        })
    }
}

/// Environment of the build process
fn environment(plan: &BuildPlan, options: &ExecuteOptions) -> BuildEnvironment {
    BuildEnvironment::for_plan(plan, options.target_dir.clone())
        .with_jobs(options.jobs)
        .with_ambient(std::env::vars())
}

fn command(plan: &BuildPlan, env: &BuildEnvironment, args: &[String]) -> Command {
    let mut cmd = Command::new(plan.toolchain.cargo());
    cmd.args(args)
        .current_dir(&plan.source.path)
        .env_clear()
        .envs(env.to_env_map());
    cmd
}

/// Run the build and publish the artifact
pub fn execute(plan: &BuildPlan, options: &ExecuteOptions) -> Result<Artifact, BuildError> {
    preflight(plan)?;
    require_tool("cargo", &plan.toolchain.cargo())?;

    let env = environment(plan, options);
    let args = plan.cargo_args();
    info!("Running cargo {}", args.join(" "));

    let output = command(plan, &env, &args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| BuildError::Spawn {
            tool: "cargo".to_string(),
            error: e.to_string(),
        })?;

    let diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
    debug!("cargo stderr:\n{diagnostics}");

    if !output.status.success() {
        return Err(diagnostics::classify(
            output.status.code(),
            diagnostics,
            &plan.dependencies,
        ));
    }

    let built = plan.artifact_path(&options.target_dir);
    if !built.is_file() {
        return Err(BuildError::ArtifactMissing {
            artifact: plan.artifact.clone(),
            path: built,
        });
    }

    let dest = options.out_dir.join(&plan.artifact);
    StagedArtifact::stage(&plan.artifact, &built, &dest)?.publish()
}

/// Run `cargo fmt` or `cargo clippy` with the plan's environment
///
/// Output goes straight to the terminal; the exit status is returned as is.
pub fn run_tool(
    plan: &BuildPlan,
    options: &ExecuteOptions,
    tool: &ToolCommand,
    extra: &[String],
) -> Result<ExitStatus, BuildError> {
    require_tool("cargo", &plan.toolchain.cargo())?;
    require_tool(tool.binary(), &plan.toolchain.bin_dir().join(tool.binary()))?;

    let env = environment(plan, options);
    let args = tool.args(plan, extra);
    info!("Running cargo {}", args.join(" "));

    command(plan, &env, &args)
        .status()
        .map_err(|e| BuildError::Spawn {
            tool: tool.binary().to_string(),
            error: e.to_string(),
        })
}
