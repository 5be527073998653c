//! Dependency set builder
//!
//! Selects build-time and build-and-run-time packages from a composed
//! universe. Every name is resolved here, once; later stages only ever see
//! resolved [`Package`] values.

use serde::Serialize;
use std::path::PathBuf;

use crate::core::universe::{OutputKind, Package, PackageUniverse};
use crate::error::{DependencyError, DependencyList};

/// Resolved dependencies of a build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencySet {
    /// Needed on the executable search path while building
    pub build_time: Vec<Package>,
    /// Needed to build and to run (library/include search paths)
    pub runtime: Vec<Package>,
}

/// Resolve both dependency lists against `universe`
///
/// A name may appear in both lists and is kept in both. Repeats within one
/// list collapse onto the first occurrence.
pub fn build(
    universe: &PackageUniverse,
    build_time: &[String],
    runtime: &[String],
) -> Result<DependencySet, DependencyError> {
    let set = DependencySet {
        build_time: select(universe, build_time, DependencyList::BuildTime)?,
        runtime: select(universe, runtime, DependencyList::Runtime)?,
    };
    tracing::debug!(
        "Dependency set: build [{}], runtime [{}]",
        names(&set.build_time).join(", "),
        names(&set.runtime).join(", ")
    );
    Ok(set)
}

fn select(
    universe: &PackageUniverse,
    requested: &[String],
    list: DependencyList,
) -> Result<Vec<Package>, DependencyError> {
    let mut selected: Vec<Package> = Vec::with_capacity(requested.len());
    for name in requested {
        if selected.iter().any(|p| p.name == *name) {
            continue;
        }
        let package = universe
            .get(name)
            .ok_or_else(|| DependencyError::UnresolvedDependency {
                name: name.clone(),
                list,
            })?;
        selected.push(package.clone());
    }
    Ok(selected)
}

fn names(packages: &[Package]) -> Vec<&str> {
    packages.iter().map(|p| p.name.as_str()).collect()
}

impl DependencySet {
    /// Find a package in either list
    pub fn get(&self, name: &str) -> Option<&Package> {
        self.runtime
            .iter()
            .chain(&self.build_time)
            .find(|p| p.name == name)
    }

    /// Executable dirs: build-time packages first, then runtime packages
    pub fn bin_dirs(&self) -> Vec<PathBuf> {
        collect_dirs(self.build_time.iter().chain(&self.runtime), OutputKind::Bin)
    }

    /// Library dirs of runtime packages
    pub fn lib_dirs(&self) -> Vec<PathBuf> {
        collect_dirs(&self.runtime, OutputKind::Lib)
    }

    /// Header dirs of runtime packages
    pub fn include_dirs(&self) -> Vec<PathBuf> {
        collect_dirs(&self.runtime, OutputKind::Include)
    }

    /// pkg-config dirs of runtime packages
    pub fn pkgconfig_dirs(&self) -> Vec<PathBuf> {
        collect_dirs(&self.runtime, OutputKind::PkgConfig)
    }
}

fn collect_dirs<'a>(packages: impl IntoIterator<Item = &'a Package>, kind: OutputKind) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for dir in packages.into_iter().flat_map(|p| p.dirs(kind)) {
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::Path;

    fn universe() -> PackageUniverse {
        PackageUniverse::from_index_toml(
            r#"
[packages.pkg-config]
version = "0.29.2"
prefix = "/opt/pkg-config"

[packages.openssl]
version = "1.1.1i"
prefix = "/opt/openssl"
libraries = ["ssl", "crypto"]

[packages.sqlite]
version = "3.34.0"
prefix = "/opt/sqlite"
libraries = ["sqlite3"]
"#,
            Path::new("packages.toml"),
            Path::new("/"),
        )
        .unwrap()
    }

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_build_reference_set() {
        let set = build(
            &universe(),
            &strings(&["pkg-config"]),
            &strings(&["openssl", "sqlite"]),
        )
        .unwrap();

        assert_eq!(names(&set.build_time), vec!["pkg-config"]);
        assert_eq!(names(&set.runtime), vec!["openssl", "sqlite"]);
        assert_eq!(
            set.bin_dirs(),
            vec![
                PathBuf::from("/opt/pkg-config/bin"),
                PathBuf::from("/opt/openssl/bin"),
                PathBuf::from("/opt/sqlite/bin"),
            ]
        );
        assert_eq!(
            set.lib_dirs(),
            vec![PathBuf::from("/opt/openssl/lib"), PathBuf::from("/opt/sqlite/lib")]
        );
    }

    #[test]
    fn test_unresolved_names_the_list() {
        assert_eq!(
            build(&universe(), &strings(&["pkg-config"]), &strings(&["ncurses"])),
            Err(DependencyError::UnresolvedDependency {
                name: "ncurses".to_string(),
                list: DependencyList::Runtime,
            })
        );
        assert_eq!(
            build(&universe(), &strings(&["cmake"]), &[]),
            Err(DependencyError::UnresolvedDependency {
                name: "cmake".to_string(),
                list: DependencyList::BuildTime,
            })
        );
    }

    #[test]
    fn test_name_in_both_lists_is_kept_in_both() {
        let set = build(&universe(), &strings(&["openssl"]), &strings(&["openssl"])).unwrap();
        assert_eq!(set.build_time.len(), 1);
        assert_eq!(set.runtime.len(), 1);
    }

    #[test]
    fn test_duplicates_within_list_collapse() {
        let set = build(
            &universe(),
            &[],
            &strings(&["sqlite", "openssl", "sqlite"]),
        )
        .unwrap();
        assert_eq!(names(&set.runtime), vec!["sqlite", "openssl"]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Building twice from the same inputs yields the same set
        #[test]
        fn prop_build_is_deterministic(
            runtime in prop::collection::vec(prop::sample::select(vec!["openssl", "sqlite", "pkg-config"]), 0..6)
        ) {
            let runtime: Vec<String> = runtime.into_iter().map(str::to_string).collect();
            let first = build(&universe(), &[], &runtime).unwrap();
            let second = build(&universe(), &[], &runtime).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
