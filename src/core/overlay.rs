//! Overlay composition
//!
//! An overlay is a transform from one package universe to the next. The
//! composer folds the base universe through an explicitly ordered overlay
//! list: each overlay sees exactly what the previous one produced, and the
//! last overlay to define a name wins. Overlays may add or replace packages
//! but never remove one; the composer checks this after every step.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::defaults::{OVERLAY_FILE, TOOLCHAIN_PACKAGE};
use crate::core::toolchain::{ChannelSpec, ToolchainDescription};
use crate::core::universe::{Package, PackageSpec, PackageUniverse};
use crate::error::OverlayError;

/// A universe transform
pub trait Overlay {
    /// Name used in errors and as package origin
    fn name(&self) -> &str;

    /// Produce the next universe from the previous one
    fn apply(&self, universe: &PackageUniverse) -> Result<PackageUniverse, OverlayError>;

    /// Toolchain this overlay asks for, if any
    fn toolchain_override(&self) -> Option<&ChannelSpec> {
        None
    }
}

/// Fold `base` through `overlays` in order
pub fn compose(
    base: PackageUniverse,
    overlays: &[Box<dyn Overlay>],
) -> Result<PackageUniverse, OverlayError> {
    overlays.iter().try_fold(base, |current, overlay| {
        let next = overlay.apply(&current)?;

        if let Some(removed) = current.names().find(|name| !next.contains(name)) {
            return Err(OverlayError::RemovedPackage {
                overlay: overlay.name().to_string(),
                package: removed.to_string(),
            });
        }

        tracing::debug!(
            "Applied overlay '{}': {} -> {} packages",
            overlay.name(),
            current.len(),
            next.len()
        );
        Ok(next)
    })
}

/// Registers the resolved toolchain as the `rust-toolchain` package
#[derive(Debug, Clone)]
pub struct ToolchainOverlay {
    toolchain: ToolchainDescription,
}

impl ToolchainOverlay {
    pub fn new(toolchain: ToolchainDescription) -> Self {
        Self { toolchain }
    }
}

impl Overlay for ToolchainOverlay {
    fn name(&self) -> &str {
        "toolchain"
    }

    fn apply(&self, universe: &PackageUniverse) -> Result<PackageUniverse, OverlayError> {
        Ok(universe.with(Package {
            name: TOOLCHAIN_PACKAGE.to_string(),
            version: self
                .toolchain
                .version
                .clone()
                .unwrap_or_else(|| self.toolchain.id()),
            prefix: self.toolchain.prefix.clone(),
            bin_dirs: vec![PathBuf::from("bin")],
            lib_dirs: vec![PathBuf::from("lib")],
            include_dirs: Vec::new(),
            pkgconfig_dirs: Vec::new(),
            libraries: Vec::new(),
            origin: self.name().to_string(),
        }))
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct OverlayFile {
    #[serde(default)]
    packages: BTreeMap<String, PackageSpec>,
    #[serde(default)]
    toolchain: Option<ChannelSpec>,
}

/// Overlay declared in an `overlay.toml`
#[derive(Debug, Clone, PartialEq)]
pub struct DeclarativeOverlay {
    name: String,
    root: PathBuf,
    packages: BTreeMap<String, PackageSpec>,
    toolchain: Option<ChannelSpec>,
}

impl DeclarativeOverlay {
    /// Parse overlay content; relative prefixes resolve against `root`
    pub fn from_toml(name: &str, content: &str, root: &Path) -> Result<Self, OverlayError> {
        let file: OverlayFile =
            toml::from_str(content).map_err(|e| OverlayError::InvalidOverlay {
                overlay: name.to_string(),
                path: root.join(OVERLAY_FILE),
                reason: e.to_string(),
            })?;

        Ok(Self {
            name: name.to_string(),
            root: root.to_path_buf(),
            packages: file.packages,
            toolchain: file.toolchain,
        })
    }

    /// Load `overlay.toml` from a materialized overlay tree
    pub fn load(name: &str, tree: &Path) -> Result<Self, OverlayError> {
        let path = tree.join(OVERLAY_FILE);
        let content =
            std::fs::read_to_string(&path).map_err(|e| OverlayError::InvalidOverlay {
                overlay: name.to_string(),
                path: path.clone(),
                reason: e.to_string(),
            })?;
        let overlay = Self::from_toml(name, &content, tree)?;
        tracing::debug!(
            "Loaded overlay '{name}' with {} packages",
            overlay.packages.len()
        );
        Ok(overlay)
    }
}

impl Overlay for DeclarativeOverlay {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, universe: &PackageUniverse) -> Result<PackageUniverse, OverlayError> {
        let packages = self
            .packages
            .iter()
            .map(|(name, spec)| spec.realize(name, universe, &self.name, &self.root))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(universe.extend(packages))
    }

    fn toolchain_override(&self) -> Option<&ChannelSpec> {
        self.toolchain.as_ref()
    }
}
