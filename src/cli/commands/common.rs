//! Pipeline shared by the commands
//!
//! Loads the project, materializes its inputs, makes sure the requested
//! channel snapshot is cached, and composes toolchain, universe and
//! dependency set.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::cli::GlobalArgs;
use crate::config::defaults::{self, OUTPUT_DIR, WORK_DIR};
use crate::core::global_config::GlobalConfig;
use crate::core::project::{Composition, ProjectContext};
use crate::core::toolchain::ResolveSettings;
use crate::infra::dirs::PinenvDirs;
use crate::infra::dist::{DirectorySnapshots, DistClient};
use crate::infra::executor::ExecuteOptions;
use crate::infra::git::SourceCache;

/// A project after composition
#[derive(Debug)]
pub struct Composed {
    pub dirs: PinenvDirs,
    pub config: GlobalConfig,
    pub project: ProjectContext,
    pub composition: Composition,
}

impl Composed {
    /// Target and output directories for builds and tools
    pub fn execute_options(&self, out_dir: Option<PathBuf>) -> ExecuteOptions {
        let root = &self.project.root;
        ExecuteOptions {
            target_dir: root.join(WORK_DIR).join("target"),
            out_dir: out_dir.unwrap_or_else(|| root.join(OUTPUT_DIR)),
            jobs: self.config.build_jobs(),
        }
    }
}

/// Load directories, global config and the project
pub fn load(global: &GlobalArgs) -> Result<(PinenvDirs, GlobalConfig, ProjectContext)> {
    let dirs = PinenvDirs::new();
    let config = GlobalConfig::load(&dirs).context("Failed to load global configuration")?;
    let project = ProjectContext::load(&global.project_dir)
        .with_context(|| format!("Failed to load project in {}", global.project_dir.display()))?;
    tracing::info!("Project: {}", project.manifest.project.name);
    Ok((dirs, config, project))
}

/// Run the composition pipeline
pub async fn compose(global: &GlobalArgs) -> Result<Composed> {
    let (dirs, config, project) = load(global)?;

    let spinner = global.output.spinner("Resolving inputs...");
    let sources = SourceCache::new(project.root.clone(), dirs.repos_dir(), dirs.sources_dir());
    let inputs = project
        .resolve_inputs(&sources)
        .context("Failed to resolve pinned inputs")?;

    let spec = inputs.request.spec()?;
    let snapshots = DirectorySnapshots::new(dirs.dist_cache_dir());
    let offline = global.offline || config.offline();
    if !offline && !snapshots.contains(&spec.channel, spec.date.as_deref()) {
        spinner.set_message(format!("Fetching channel manifest {}...", spec.id()));
        let client = DistClient::new(config.dist_server());
        let found = client
            .prefetch(&spec.channel, spec.date.as_deref(), &dirs.dist_cache_dir())
            .await
            .with_context(|| format!("Failed to fetch channel manifest for {}", spec.id()))?;
        if !found {
            tracing::warn!("Dist server has no snapshot for {}", spec.id());
        }
    }

    spinner.set_message("Composing...");
    let settings = ResolveSettings {
        target: project
            .manifest
            .toolchain
            .target
            .clone()
            .or_else(|| config.toolchains.target.clone())
            .unwrap_or_else(|| defaults::host_target().to_string()),
        toolchains_dir: config.toolchains_dir(&dirs),
    };
    let composition = project.compose(inputs, &snapshots, &settings);
    spinner.finish_and_clear();

    Ok(Composed {
        composition: composition.context("Composition failed")?,
        dirs,
        config,
        project,
    })
}
