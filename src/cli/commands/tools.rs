//! Formatter and linter commands
//!
//! `pinenv fmt` and `pinenv lint` delegate to `cargo fmt` / `cargo clippy`
//! of the resolved toolchain, with the build's dependency environment.

use anyhow::Result;

use super::common;
use crate::cli::GlobalArgs;
use crate::error::ToolchainError;
use crate::infra::executor::{self, ToolCommand};

/// Run `tool` against the project's source tree
pub async fn execute(global: &GlobalArgs, tool: ToolCommand, extra: Vec<String>) -> Result<i32> {
    let composed = common::compose(global).await?;
    let plan = composed.composition.build_plan(&composed.project.manifest);

    if !plan.toolchain.has_component(tool.component()) {
        return Err(ToolchainError::ComponentUnavailable {
            component: tool.component().to_string(),
            toolchain: plan.toolchain.id(),
        }
        .into());
    }
    plan.toolchain.ensure_installed()?;

    let options = composed.execute_options(None);
    let status = tokio::task::spawn_blocking(move || executor::run_tool(&plan, &options, &tool, &extra))
        .await??;
    Ok(status.code().unwrap_or(1))
}
