//! Check command logic
//!
//! Summarizes a composed build plan without executing it: the resolved
//! toolchain, the dependency set, the plan fingerprint and anything that
//! would make the build fail later (toolchain not installed, native
//! libraries absent from their package's lib dirs).

use serde::Serialize;
use std::path::PathBuf;

use crate::core::plan::{BuildPlan, Profile, SourceTree};
use crate::core::toolchain::ToolchainDescription;
use crate::core::universe::Package;

/// One dependency as shown in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencySummary {
    pub name: String,
    pub version: String,
    pub origin: String,
    pub prefix: PathBuf,
}

impl From<&Package> for DependencySummary {
    fn from(package: &Package) -> Self {
        Self {
            name: package.name.clone(),
            version: package.version.clone(),
            origin: package.origin.clone(),
            prefix: package.prefix.clone(),
        }
    }
}

/// A native library that could not be found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingLibrary {
    pub package: String,
    pub library: String,
    /// Directories that were searched
    pub searched: Vec<PathBuf>,
}

/// Result of the check operation
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub project: String,
    pub artifact: String,
    pub profile: Profile,
    pub source: SourceTree,
    pub toolchain: ToolchainDescription,
    pub toolchain_installed: bool,
    pub build_time: Vec<DependencySummary>,
    pub runtime: Vec<DependencySummary>,
    pub missing_libraries: Vec<MissingLibrary>,
    /// SHA-256 of the canonical plan
    pub fingerprint: String,
    pub warnings: Vec<String>,
}

impl CheckReport {
    /// Whether a build would get past its pre-flight checks
    pub fn is_ready(&self) -> bool {
        self.toolchain_installed && self.missing_libraries.is_empty()
    }
}

/// Build the report for `plan`
pub fn check(
    project: &str,
    plan: &BuildPlan,
    missing_libraries: Vec<MissingLibrary>,
) -> Result<CheckReport, serde_json::Error> {
    let toolchain_installed = plan.toolchain.is_installed();
    let mut warnings = Vec::new();

    if !toolchain_installed {
        warnings.push(format!(
            "toolchain {} is not installed at {}",
            plan.toolchain.id(),
            plan.toolchain.prefix.display()
        ));
    }
    for missing in &missing_libraries {
        warnings.push(format!(
            "native library '{}' of '{}' not found in {}",
            missing.library,
            missing.package,
            missing
                .searched
                .iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    Ok(CheckReport {
        project: project.to_string(),
        artifact: plan.artifact.clone(),
        profile: plan.profile,
        source: plan.source.clone(),
        toolchain: plan.toolchain.clone(),
        toolchain_installed,
        build_time: plan.dependencies.build_time.iter().map(Into::into).collect(),
        runtime: plan.dependencies.runtime.iter().map(Into::into).collect(),
        missing_libraries,
        fingerprint: plan.fingerprint()?,
        warnings,
    })
}
