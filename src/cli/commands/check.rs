//! Check command implementation
//!
//! Implements `pinenv check`: compose the project and build (without
//! executing) its plan, then print the plan summary and fingerprint.

use std::collections::BTreeMap;

use anyhow::Result;

use super::common;
use crate::cli::output::status;
use crate::cli::GlobalArgs;
use crate::core::check::{self, CheckReport, DependencySummary};
use crate::core::environment;
use crate::infra::native;

/// Execute the check command
///
/// Fails only when composition fails; a missing toolchain install or
/// native library is reported as a warning.
pub async fn execute(global: &GlobalArgs) -> Result<i32> {
    let composed = common::compose(global).await?;
    let manifest = &composed.project.manifest;
    let plan = composed.composition.build_plan(manifest);

    // Hooks and bindings are validated too, but never feed the plan
    let descriptor = composed.composition.environment(manifest)?;
    environment::session_env(&descriptor, &BTreeMap::new())?;

    let missing = native::missing_libraries(&plan.dependencies);
    let report = check::check(&manifest.project.name, &plan, missing)?;

    if global.output.json {
        global.output.print_json(&report)?;
    } else if !global.output.quiet {
        print_report(&report);
    }
    Ok(0)
}

fn print_report(report: &CheckReport) {
    println!("{} Project {} composes", status::SUCCESS, report.project);
    println!(
        "  Artifact:    {} ({})",
        report.artifact, report.profile
    );
    println!(
        "  Source:      {} ({})",
        report.source.input,
        report.source.path.display()
    );
    println!(
        "  Toolchain:   {} {} [{}]",
        report.toolchain.id(),
        report.toolchain.version.as_deref().unwrap_or(""),
        report.toolchain.components.join(", ")
    );
    println!("  Target:      {}", report.toolchain.target);
    println!("  Requested:   {}", report.toolchain.request);
    print_dependencies("Build-time:", &report.build_time);
    print_dependencies("Runtime:", &report.runtime);
    println!("  Fingerprint: {}", report.fingerprint);

    if !report.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &report.warnings {
            println!("  {} {warning}", status::WARNING);
        }
    }
}

fn print_dependencies(label: &str, deps: &[DependencySummary]) {
    if deps.is_empty() {
        println!("  {label:<12} (none)");
        return;
    }
    for (i, dep) in deps.iter().enumerate() {
        let label = if i == 0 { label } else { "" };
        println!(
            "  {label:<12} {} {} [{}]",
            dep.name, dep.version, dep.origin
        );
    }
}
