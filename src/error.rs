//! Error types for pinenv
//!
//! Domain-specific error types using thiserror. Every variant names the
//! input, overlay, dependency or binding responsible so the fix can be made
//! at the pin or overlay level.

use std::path::PathBuf;
use thiserror::Error;

/// Source pinning table errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PinError {
    /// Logical input name absent from the lock file
    #[error("Unknown input '{name}': no pin recorded in the lock file")]
    UnknownInput { name: String },

    /// Pin reference is malformed
    #[error("Input '{name}' has an invalid pin: {reason}")]
    InvalidPin { name: String, reason: String },

    /// Pin exists but has the wrong kind for its use
    #[error("Input '{name}' is pinned as {found}, expected {expected}")]
    WrongKind {
        name: String,
        found: String,
        expected: String,
    },

    /// Lock file format version not understood
    #[error("Unsupported lock file version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// Lock file could not be parsed
    #[error("Failed to parse lock file '{path}': {error}")]
    Parse { path: PathBuf, error: String },
}

/// Toolchain resolution errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolchainError {
    /// Neither a toolchain file, a channel, nor an overlay override was given
    #[error("No toolchain requested: set [toolchain] file or channel in pinenv.toml")]
    NoToolchainRequest,

    /// No snapshot exists for the exact channel and date
    #[error("Toolchain '{channel}' is unavailable at date {date}: no snapshot for that exact date")]
    ToolchainUnavailable { channel: String, date: String },

    /// Moving channel requested without a date
    #[error("Channel '{channel}' is not reproducible without a date (e.g. {channel}-2021-01-15)")]
    UnpinnedChannel { channel: String },

    /// Channel name is not recognized
    #[error("Invalid toolchain channel '{channel}': {reason}")]
    InvalidChannel { channel: String, reason: String },

    /// Date is not a calendar date
    #[error("Invalid toolchain date '{date}': {reason}")]
    InvalidDate { date: String, reason: String },

    /// Requested component missing from the snapshot
    #[error("Component '{component}' is not provided by toolchain {toolchain}")]
    ComponentUnavailable { component: String, toolchain: String },

    /// Snapshot does not ship the compiler for the target
    #[error("Target '{target}' is not provided by toolchain {toolchain}")]
    TargetUnavailable { target: String, toolchain: String },

    /// Toolchain file is malformed
    #[error("Invalid toolchain file '{path}': {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    /// Channel manifest is malformed or does not match its key
    #[error("Invalid channel snapshot '{path}': {reason}")]
    InvalidSnapshot { path: PathBuf, reason: String },

    /// Resolved toolchain is not installed where expected
    #[error("Toolchain {toolchain} is not installed at '{path}'")]
    NotInstalled { toolchain: String, path: PathBuf },
}

/// Overlay composition errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OverlayError {
    /// An overlay dropped a package present in the previous layer
    #[error("Overlay '{overlay}' removed package '{package}'; overlays may only add or replace")]
    RemovedPackage { overlay: String, package: String },

    /// `extends` names a package absent from the previous layer
    #[error("Overlay '{overlay}' extends unknown package '{package}'")]
    UnknownBasePackage { overlay: String, package: String },

    /// Overlay file could not be read or parsed
    #[error("Invalid overlay '{overlay}' at '{path}': {reason}")]
    InvalidOverlay {
        overlay: String,
        path: PathBuf,
        reason: String,
    },

    /// Package index could not be read or parsed
    #[error("Invalid package index '{path}': {reason}")]
    InvalidPackageIndex { path: PathBuf, reason: String },

    /// Package definition is incomplete
    #[error("Package '{package}' defined by '{layer}' is missing required field '{field}'")]
    MissingField {
        layer: String,
        package: String,
        field: String,
    },

    /// Input listed as overlay is not pinned as one
    #[error("Input '{name}' is listed as an overlay but its pin is not marked `overlay = true`")]
    NotAnOverlay { name: String },
}

/// Which dependency list a name was requested from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyList {
    /// Build-time only (executable search path)
    BuildTime,
    /// Build and run time (library/include search paths)
    Runtime,
}

impl std::fmt::Display for DependencyList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BuildTime => write!(f, "build"),
            Self::Runtime => write!(f, "runtime"),
        }
    }
}

/// Dependency set errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DependencyError {
    /// Requested package absent from the composed universe
    #[error("Unresolved dependency '{name}' ({list}): not present in the composed package universe")]
    UnresolvedDependency { name: String, list: DependencyList },
}

/// Build execution errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// Compiler reported errors
    #[error("Compilation failed (exit code {}):\n{diagnostics}", code_display(*code))]
    CompileError {
        code: Option<i32>,
        diagnostics: String,
    },

    /// Linker reported errors
    #[error("Linking failed (exit code {}):\n{diagnostics}", code_display(*code))]
    LinkError {
        code: Option<i32>,
        diagnostics: String,
    },

    /// A native library is not on the configured search path
    #[error("Missing native library '{library}'{}{}", required_by(package.as_deref()), with_diagnostics(diagnostics))]
    MissingNativeLibrary {
        library: String,
        package: Option<String>,
        diagnostics: String,
    },

    /// Moving the staged artifact to its published path failed
    #[error("Failed to publish artifact to '{path}': {error}")]
    ArtifactPublishFailure { path: PathBuf, error: String },

    /// Build succeeded but the expected output does not exist
    #[error("Build succeeded but artifact '{artifact}' was not produced at '{path}'")]
    ArtifactMissing { artifact: String, path: PathBuf },

    /// Toolchain binary missing
    #[error("Tool '{tool}' not found at '{path}'")]
    ToolNotFound { tool: String, path: PathBuf },

    /// Tool could not be started
    #[error("Failed to run '{tool}': {error}")]
    Spawn { tool: String, error: String },
}

fn code_display(code: Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

fn required_by(package: Option<&str>) -> String {
    package
        .map(|p| format!(" required by '{p}'"))
        .unwrap_or_default()
}

fn with_diagnostics(diagnostics: &str) -> String {
    if diagnostics.is_empty() {
        String::new()
    } else {
        format!(":\n{diagnostics}")
    }
}

/// Environment composition errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvironmentError {
    /// `${name}` refers to a binding that does not exist
    #[error("Binding '{binding}' references unknown binding '{reference}'")]
    UnknownBinding { binding: String, reference: String },

    /// Bindings reference each other in a loop
    #[error("Binding cycle detected: {}", cycle.join(" -> "))]
    BindingCycle { cycle: Vec<String> },

    /// Package reference outside the dependency set
    #[error("Binding '{binding}' references package '{package}', which is not in the dependency set")]
    UnresolvedDependency { binding: String, package: String },

    /// Package output kind not recognized or empty
    #[error("Binding '{binding}' references unknown output '{output}' of package '{package}'")]
    UnknownOutput {
        binding: String,
        package: String,
        output: String,
    },

    /// Binding named after a search path the session composes
    #[error("Binding '{binding}' would replace the composed search path; extend it from a hook instead")]
    ReservedBinding { binding: String },

    /// Template syntax error
    #[error("Binding '{binding}' is malformed: {reason}")]
    MalformedTemplate { binding: String, reason: String },

    /// Hook guard could not be parsed
    #[error("Hook '{hook}' has an invalid guard '{guard}'")]
    InvalidGuard { hook: String, guard: String },

    /// Hook action failed
    #[error("Hook '{hook}' failed: {error}")]
    HookFailed { hook: String, error: String },

    /// Session shell could not be started
    #[error("Failed to start shell '{shell}': {error}")]
    ShellSpawn { shell: String, error: String },
}

/// Source materialization errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Repository could not be fetched
    #[error("Failed to fetch '{url}' for input '{name}': {error}")]
    FetchFailed {
        name: String,
        url: String,
        error: String,
    },

    /// Pinned revision absent from the repository
    #[error("Revision '{rev}' of input '{name}' not found in '{url}'")]
    RevisionNotFound {
        name: String,
        url: String,
        rev: String,
    },

    /// Tree export failed
    #[error("Failed to export revision '{rev}' of input '{name}': {error}")]
    ExportFailed {
        name: String,
        rev: String,
        error: String,
    },

    /// Materialized tree does not match the recorded hash
    #[error("Hash mismatch for input '{name}': expected {expected}, got {actual}")]
    HashMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Local path pin does not exist
    #[error("Input '{name}' points to missing path '{path}'")]
    PathNotFound { name: String, path: PathBuf },

    /// Input kind cannot be materialized as a tree
    #[error("Input '{name}' is a {kind} pin and has no source tree")]
    NotATree { name: String, kind: String },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    Io { path: PathBuf, error: String },
}

/// Channel manifest download errors
#[derive(Error, Debug)]
pub enum DistError {
    /// Network error
    #[error("Network error fetching '{url}': {error}")]
    Network { url: String, error: String },

    /// Unexpected HTTP status
    #[error("Dist server returned {status} for '{url}'")]
    Status { url: String, status: u16 },

    /// Fetched manifest could not be cached
    #[error("Failed to cache channel manifest at '{path}': {error}")]
    Cache { path: PathBuf, error: String },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },

    /// Failed to move a staged file or directory into place
    #[error("Failed to publish '{path}': {error}")]
    Publish { path: PathBuf, error: String },
}

/// Top-level pinenv error type
#[derive(Error, Debug)]
pub enum PinenvError {
    /// Project file not found
    #[error("Project file not found at '{path}'")]
    ManifestNotFound { path: PathBuf },

    /// Project file could not be read
    #[error("Failed to read '{path}': {error}")]
    ManifestRead { path: PathBuf, error: String },

    /// Project file parse error
    #[error("Failed to parse '{path}': {source}")]
    ManifestParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Pin error
    #[error(transparent)]
    Pin(#[from] PinError),

    /// Toolchain error
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    /// Overlay error
    #[error(transparent)]
    Overlay(#[from] OverlayError),

    /// Dependency error
    #[error(transparent)]
    Dependency(#[from] DependencyError),

    /// Build error
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Environment error
    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    /// Source error
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Dist error
    #[error(transparent)]
    Dist(#[from] DistError),

    /// Filesystem error
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_input_names_the_input() {
        let err = PinError::UnknownInput {
            name: "overlayB".to_string(),
        };
        assert!(err.to_string().contains("overlayB"));
    }

    #[test]
    fn test_missing_native_library_message() {
        let err = BuildError::MissingNativeLibrary {
            library: "ssl".to_string(),
            package: Some("openssl".to_string()),
            diagnostics: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "Missing native library 'ssl' required by 'openssl'"
        );
    }

    #[test]
    fn test_compile_error_keeps_diagnostics_verbatim() {
        let diagnostics = "error[E0425]: cannot find value `x`\n  --> src/main.rs:2:5";
        let err = BuildError::CompileError {
            code: Some(101),
            diagnostics: diagnostics.to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("exit code 101"));
        assert!(message.ends_with(diagnostics));
    }

    #[test]
    fn test_top_level_error_is_transparent() {
        let err: PinenvError = DependencyError::UnresolvedDependency {
            name: "sqlite".to_string(),
            list: DependencyList::Runtime,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Unresolved dependency 'sqlite' (runtime): not present in the composed package universe"
        );
    }
}
