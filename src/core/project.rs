//! Project pipeline
//!
//! Drives the whole composition: pinned inputs are materialized, the
//! toolchain request is selected and resolved, the base universe is folded
//! through the toolchain overlay and the declared overlays, and the
//! dependency set is built. Both the build plan and the environment
//! descriptor are derived from the resulting [`Composition`].

use std::path::{Path, PathBuf};

use crate::config::defaults::{LOCK_FILE, PACKAGE_INDEX_FILE, PROJECT_FILE};
use crate::core::deps::{self, DependencySet};
use crate::core::dist::SnapshotIndex;
use crate::core::environment::EnvironmentDescriptor;
use crate::core::manifest::ProjectManifest;
use crate::core::overlay::{self, DeclarativeOverlay, Overlay, ToolchainOverlay};
use crate::core::pins::{PinTable, PinnedInput};
use crate::core::plan::{BuildPlan, SourceTree};
use crate::core::toolchain::{self, ResolveSettings, ToolchainDescription, ToolchainFile, ToolchainRequest};
use crate::core::universe::PackageUniverse;
use crate::error::{EnvironmentError, OverlayError, PinenvError, SourceError};

/// Materializes pinned inputs as directory trees
pub trait SourceProvider {
    /// Directory holding the input's content
    fn materialize(&self, input: &PinnedInput) -> Result<PathBuf, SourceError>;
}

/// A loaded project: project file plus pin table
#[derive(Debug, Clone)]
pub struct ProjectContext {
    /// Project directory
    pub root: PathBuf,
    pub manifest: ProjectManifest,
    pub pins: PinTable,
}

impl ProjectContext {
    /// Load `pinenv.toml` and `pinenv.lock` from `root`
    ///
    /// A missing lock file yields an empty table, so every input lookup
    /// reports the missing pin by name.
    pub fn load(root: &Path) -> Result<Self, PinenvError> {
        let manifest = ProjectManifest::load(&root.join(PROJECT_FILE))?;
        let lock_path = root.join(LOCK_FILE);
        let pins = if lock_path.is_file() {
            PinTable::load(&lock_path)?
        } else {
            tracing::warn!("No {LOCK_FILE} in {}", root.display());
            PinTable::default()
        };

        Ok(Self {
            root: root.to_path_buf(),
            manifest,
            pins,
        })
    }

    /// Path of the lock file
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Materialize inputs and select the toolchain request
    pub fn resolve_inputs(&self, sources: &dyn SourceProvider) -> Result<ResolvedInputs, PinenvError> {
        let project = &self.manifest.project;

        let source_pin = self.pins.resolve(&project.source)?;
        let source = SourceTree {
            input: source_pin.name.clone(),
            reference: source_pin.reference.clone(),
            path: sources.materialize(source_pin)?,
        };

        let packages = project
            .packages
            .as_ref()
            .map(|name| -> Result<PathBuf, PinenvError> {
                Ok(sources.materialize(self.pins.resolve(name)?)?)
            })
            .transpose()?;

        let mut overlays = Vec::with_capacity(project.overlays.len());
        for name in &project.overlays {
            let pin = self.pins.resolve(name)?;
            if !pin.overlay {
                return Err(OverlayError::NotAnOverlay { name: name.clone() }.into());
            }
            let tree = sources.materialize(pin)?;
            overlays.push(DeclarativeOverlay::load(name, &tree)?);
        }

        let toolchain_file = match &self.manifest.toolchain.file {
            Some(file) => {
                let path = source.path.join(file);
                let parsed = ToolchainFile::load(&path)?;
                Some((path, parsed))
            }
            None => None,
        };
        let overrides: Vec<_> = overlays
            .iter()
            .filter_map(|o| o.toolchain_override().map(|s| (o.name().to_string(), s.clone())))
            .collect();
        let request = ToolchainRequest::select(
            toolchain_file,
            self.manifest.explicit_channel(&self.pins)?,
            &overrides,
        )?;

        Ok(ResolvedInputs {
            source,
            packages,
            overlays,
            request,
        })
    }

    /// Resolve the toolchain and compose universe and dependency set
    pub fn compose(
        &self,
        inputs: ResolvedInputs,
        snapshots: &dyn SnapshotIndex,
        settings: &ResolveSettings,
    ) -> Result<Composition, PinenvError> {
        let toolchain = toolchain::resolve(&inputs.request, snapshots, settings)?;

        let base = match &inputs.packages {
            Some(tree) => PackageUniverse::load_index(&tree.join(PACKAGE_INDEX_FILE))?,
            None => PackageUniverse::empty(),
        };

        let mut overlays: Vec<Box<dyn Overlay>> =
            vec![Box::new(ToolchainOverlay::new(toolchain.clone()))];
        overlays.extend(
            inputs
                .overlays
                .into_iter()
                .map(|o| Box::new(o) as Box<dyn Overlay>),
        );
        let universe = overlay::compose(base, &overlays)?;

        let dependencies = deps::build(
            &universe,
            &self.manifest.dependencies.build,
            &self.manifest.dependencies.runtime,
        )?;

        tracing::info!(
            "Composed {} packages, {} build-time and {} runtime dependencies",
            universe.len(),
            dependencies.build_time.len(),
            dependencies.runtime.len()
        );

        Ok(Composition {
            toolchain,
            universe,
            dependencies,
            source: inputs.source,
        })
    }
}

/// Inputs after materialization
#[derive(Debug, Clone)]
pub struct ResolvedInputs {
    pub source: SourceTree,
    /// Tree holding `packages.toml`
    pub packages: Option<PathBuf>,
    /// Declared overlays in application order
    pub overlays: Vec<DeclarativeOverlay>,
    pub request: ToolchainRequest,
}

/// Result of the composition stages
#[derive(Debug, Clone)]
pub struct Composition {
    pub toolchain: ToolchainDescription,
    pub universe: PackageUniverse,
    pub dependencies: DependencySet,
    pub source: SourceTree,
}

impl Composition {
    /// Build plan for the project artifact
    pub fn build_plan(&self, manifest: &ProjectManifest) -> BuildPlan {
        BuildPlan::new(
            manifest.artifact(),
            manifest.project.profile,
            self.source.clone(),
            self.toolchain.clone(),
            self.dependencies.clone(),
        )
    }

    /// Environment descriptor sharing the plan's dependency set
    pub fn environment(&self, manifest: &ProjectManifest) -> Result<EnvironmentDescriptor, EnvironmentError> {
        Ok(EnvironmentDescriptor {
            name: manifest.project.name.clone(),
            toolchain: self.toolchain.clone(),
            dependencies: self.dependencies.clone(),
            bindings: manifest.shell.env.clone(),
            hooks: manifest.hooks()?,
        })
    }
}
