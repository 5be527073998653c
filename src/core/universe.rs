//! Package universe
//!
//! The universe is the name-indexed set of packages available to a build.
//! It is never mutated: [`PackageUniverse::with`] and
//! [`PackageUniverse::extend`] return new values, which is what lets the
//! overlay composer compare each step against the previous one.
//!
//! Packages are declared in TOML (`packages.toml` for the base layer,
//! `overlay.toml` for overlays):
//!
//! ```toml
//! [packages.openssl]
//! version = "1.1.1i"
//! prefix = "/opt/openssl"
//! libraries = ["ssl", "crypto"]
//!
//! [packages.openssl-static]
//! extends = "openssl"
//! lib = ["lib64"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::OverlayError;

/// Layer name of the base package index
pub const BASE_LAYER: &str = "base";

/// A package in the universe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    /// Install root; output dirs are relative to it
    pub prefix: PathBuf,
    pub bin_dirs: Vec<PathBuf>,
    pub lib_dirs: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub pkgconfig_dirs: Vec<PathBuf>,
    /// Native libraries the package provides (`ssl` for `libssl`)
    pub libraries: Vec<String>,
    /// Layer that defined this package (`base` or an overlay name)
    pub origin: String,
}

/// Output directory kinds of a package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Bin,
    Lib,
    Include,
    PkgConfig,
}

impl OutputKind {
    /// Parse an output name as used in binding templates
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bin" => Some(Self::Bin),
            "lib" => Some(Self::Lib),
            "include" => Some(Self::Include),
            "pkgconfig" => Some(Self::PkgConfig),
            _ => None,
        }
    }
}

impl Package {
    /// Absolute directories of one output kind
    pub fn dirs(&self, kind: OutputKind) -> Vec<PathBuf> {
        let relative = match kind {
            OutputKind::Bin => &self.bin_dirs,
            OutputKind::Lib => &self.lib_dirs,
            OutputKind::Include => &self.include_dirs,
            OutputKind::PkgConfig => &self.pkgconfig_dirs,
        };
        relative.iter().map(|dir| self.prefix.join(dir)).collect()
    }
}

/// A package declaration; every field may be inherited through `extends`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSpec {
    /// Derive from this package of the previous layer
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Install root, relative paths resolve against the declaring tree
    #[serde(default)]
    pub prefix: Option<PathBuf>,
    #[serde(default)]
    pub bin: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub lib: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub include: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub pkgconfig: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub libraries: Option<Vec<String>>,
}

impl PackageSpec {
    /// Turn the declaration into a package
    ///
    /// `previous` is the universe the declaring layer is applied to; it is
    /// only consulted for `extends`. `root` is the tree the declaration came
    /// from.
    pub fn realize(
        &self,
        name: &str,
        previous: &PackageUniverse,
        layer: &str,
        root: &Path,
    ) -> Result<Package, OverlayError> {
        let base = match &self.extends {
            Some(parent) => Some(previous.get(parent).ok_or_else(|| {
                OverlayError::UnknownBasePackage {
                    overlay: layer.to_string(),
                    package: parent.clone(),
                }
            })?),
            None => None,
        };

        let missing = |field: &str| OverlayError::MissingField {
            layer: layer.to_string(),
            package: name.to_string(),
            field: field.to_string(),
        };

        let version = self
            .version
            .clone()
            .or_else(|| base.map(|b| b.version.clone()))
            .ok_or_else(|| missing("version"))?;

        let prefix = match (&self.prefix, base) {
            (Some(prefix), _) => root.join(prefix),
            (None, Some(base)) => base.prefix.clone(),
            (None, None) => return Err(missing("prefix")),
        };

        let dirs = |own: Option<&Vec<PathBuf>>, inherited: Option<&Vec<PathBuf>>, default: &str| {
            own.or(inherited)
                .cloned()
                .unwrap_or_else(|| vec![PathBuf::from(default)])
        };

        Ok(Package {
            name: name.to_string(),
            version,
            prefix,
            bin_dirs: dirs(self.bin.as_ref(), base.map(|b| &b.bin_dirs), "bin"),
            lib_dirs: dirs(self.lib.as_ref(), base.map(|b| &b.lib_dirs), "lib"),
            include_dirs: dirs(self.include.as_ref(), base.map(|b| &b.include_dirs), "include"),
            pkgconfig_dirs: dirs(
                self.pkgconfig.as_ref(),
                base.map(|b| &b.pkgconfig_dirs),
                "lib/pkgconfig",
            ),
            libraries: self
                .libraries
                .clone()
                .or_else(|| base.map(|b| b.libraries.clone()))
                .unwrap_or_default(),
            origin: layer.to_string(),
        })
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PackageIndexFile {
    #[serde(default)]
    packages: BTreeMap<String, PackageSpec>,
}

/// Immutable, name-indexed package set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageUniverse {
    packages: BTreeMap<String, Package>,
}

impl PackageUniverse {
    /// Universe with no packages
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a base package index; `root` anchors relative prefixes
    pub fn from_index_toml(content: &str, path: &Path, root: &Path) -> Result<Self, OverlayError> {
        let index: PackageIndexFile =
            toml::from_str(content).map_err(|e| OverlayError::InvalidPackageIndex {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let empty = Self::empty();
        let packages = index
            .packages
            .iter()
            .map(|(name, spec)| spec.realize(name, &empty, BASE_LAYER, root))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(empty.extend(packages))
    }

    /// Load the base package index file
    pub fn load_index(path: &Path) -> Result<Self, OverlayError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| OverlayError::InvalidPackageIndex {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        let universe = Self::from_index_toml(&content, path, root)?;
        tracing::debug!(
            "Loaded {} base packages from {}",
            universe.len(),
            path.display()
        );
        Ok(universe)
    }

    /// Look up a package
    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    /// Whether a package exists
    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Package names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    /// Packages in name order
    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// New universe with `package` added or replaced by name
    #[must_use]
    pub fn with(&self, package: Package) -> Self {
        self.extend([package])
    }

    /// New universe with all `packages` added or replaced by name
    #[must_use]
    pub fn extend(&self, packages: impl IntoIterator<Item = Package>) -> Self {
        let mut next = self.packages.clone();
        for package in packages {
            next.insert(package.name.clone(), package);
        }
        Self { packages: next }
    }
}
