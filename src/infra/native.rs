//! Native library discovery
//!
//! Checks that every library a runtime dependency declares is present in
//! one of that package's lib dirs before the build tool is started.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::core::check::MissingLibrary;
use crate::core::deps::DependencySet;
use crate::core::universe::{OutputKind, Package};

/// Whether `file_name` is a shared or static build of library `name`
fn provides(file_name: &str, name: &str) -> bool {
    let Some(rest) = file_name.strip_prefix("lib").and_then(|f| f.strip_prefix(name)) else {
        return false;
    };
    rest == ".a" || rest == ".dylib" || rest == ".so" || rest.starts_with(".so.") || {
        // libssl.1.1.dylib
        rest.starts_with('.') && rest.ends_with(".dylib")
    }
}

/// Find `library` in `dirs` (not recursive)
pub fn find_library(library: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter().find_map(|dir| find_in_dir(library, dir))
}

fn find_in_dir(library: &str, dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .find(|entry| {
            !entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| provides(name, library))
        })
        .map(walkdir::DirEntry::into_path)
}

/// Libraries of `package` absent from its lib dirs
pub fn missing_for_package(package: &Package) -> Vec<MissingLibrary> {
    let lib_dirs = package.dirs(OutputKind::Lib);
    package
        .libraries
        .iter()
        .filter(|library| find_library(library, &lib_dirs).is_none())
        .map(|library| MissingLibrary {
            package: package.name.clone(),
            library: library.clone(),
            searched: lib_dirs.clone(),
        })
        .collect()
}

/// Libraries of all build-and-run-time dependencies that cannot be found
pub fn missing_libraries(dependencies: &DependencySet) -> Vec<MissingLibrary> {
    dependencies
        .runtime
        .iter()
        .flat_map(missing_for_package)
        .collect()
}
