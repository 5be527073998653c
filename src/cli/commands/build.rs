//! Build command implementation
//!
//! Implements `pinenv build`: compose the project, build the plan's artifact
//! with the pinned toolchain and publish it into the output directory.

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::common;
use crate::cli::output::status;
use crate::cli::GlobalArgs;
use crate::infra::executor;

/// Build options
#[derive(Debug, Default)]
pub struct BuildOptions {
    /// Publish into this directory instead of `<project>/result`
    pub out: Option<PathBuf>,
    /// Number of parallel jobs
    pub jobs: Option<usize>,
}

/// Execute the build command
pub async fn execute(global: &GlobalArgs, options: BuildOptions) -> Result<i32> {
    let composed = common::compose(global).await?;
    let plan = composed.composition.build_plan(&composed.project.manifest);
    let fingerprint = plan.fingerprint()?;

    plan.toolchain
        .ensure_installed()
        .with_context(|| format!("Cannot build with {}", plan.toolchain.request))?;

    let mut execute_options = composed.execute_options(options.out);
    if let Some(jobs) = options.jobs {
        execute_options.jobs = jobs.max(1);
    }

    tracing::info!(
        "Building {} with {} (plan {})",
        plan.artifact,
        plan.toolchain.id(),
        &fingerprint[..12]
    );
    global.output.status(
        status::INFO,
        &format!("Building {} ({}, {})", plan.artifact, plan.profile, plan.toolchain.id()),
    );

    let artifact = tokio::task::spawn_blocking(move || executor::execute(&plan, &execute_options))
        .await
        .context("Build task failed")??;

    if global.output.json {
        global.output.print_json(&serde_json::json!({
            "artifact": artifact,
            "fingerprint": fingerprint,
        }))?;
    } else {
        global.output.status(
            status::SUCCESS,
            &format!("Built {} -> {}", artifact.name, artifact.path.display()),
        );
        global.output.status(" ", &format!("sha256 {}", artifact.sha256));
    }
    Ok(0)
}
