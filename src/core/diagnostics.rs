//! Build failure classification
//!
//! Maps the build tool's diagnostic text onto the build error taxonomy. The
//! diagnostics are attached verbatim; classification only decides the
//! variant and, for missing libraries, which dependency was responsible.

use regex::Regex;
use std::sync::OnceLock;

use crate::core::deps::DependencySet;
use crate::error::BuildError;

fn missing_library_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"cannot find -l([A-Za-z0-9_+.\-]+)",
            r"unable to find library -l([A-Za-z0-9_+.\-]+)",
            r"could not find native static library `([^`]+)`",
            r"The system library `([^`]+)` required by crate",
            r"Package ([A-Za-z0-9_+.\-]+) was not found in the pkg-config search path",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}

const OPENSSL_DETECTION_FAILURE: &str = "Could not find directory of OpenSSL installation";

const LINK_MARKERS: &[&str] = &[
    "error: linking with",
    "undefined reference to",
    "ld returned",
    "Undefined symbols for architecture",
    "linker `cc` not found",
];

/// Name of the native library the diagnostics complain about, if any
pub fn missing_library(diagnostics: &str) -> Option<String> {
    for pattern in missing_library_patterns() {
        if let Some(captures) = pattern.captures(diagnostics) {
            let name = &captures[1];
            return Some(name.strip_prefix("lib").unwrap_or(name).to_string());
        }
    }
    diagnostics
        .contains(OPENSSL_DETECTION_FAILURE)
        .then(|| "ssl".to_string())
}

/// Classify a failed build
pub fn classify(code: Option<i32>, diagnostics: String, dependencies: &DependencySet) -> BuildError {
    if let Some(library) = missing_library(&diagnostics) {
        let package = provider(&library, dependencies);
        return BuildError::MissingNativeLibrary {
            library,
            package,
            diagnostics,
        };
    }

    if LINK_MARKERS.iter().any(|marker| diagnostics.contains(marker)) {
        return BuildError::LinkError { code, diagnostics };
    }

    BuildError::CompileError { code, diagnostics }
}

/// Dependency declaring `library`, falling back to a package of that name
fn provider(library: &str, dependencies: &DependencySet) -> Option<String> {
    dependencies
        .runtime
        .iter()
        .chain(&dependencies.build_time)
        .find(|p| p.libraries.iter().any(|l| l == library) || p.name == library)
        .map(|p| p.name.clone())
}
