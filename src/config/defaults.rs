//! Default configuration values

/// Project file name
pub const PROJECT_FILE: &str = "pinenv.toml";

/// Lock file name
pub const LOCK_FILE: &str = "pinenv.lock";

/// Lock file format version
pub const LOCK_VERSION: u32 = 1;

/// Package index file inside a packages input
pub const PACKAGE_INDEX_FILE: &str = "packages.toml";

/// Overlay definition file inside an overlay input
pub const OVERLAY_FILE: &str = "overlay.toml";

/// Default logical name of the application source input
pub const DEFAULT_SOURCE_INPUT: &str = "source";

/// Default rustup profile for channel/date requests
pub const DEFAULT_TOOLCHAIN_PROFILE: &str = "minimal";

/// Components every toolchain carries when a snapshot has no profile table
pub const BASE_COMPONENTS: &[&str] = &["rustc", "cargo", "rust-std"];

/// The single compiler component
pub const COMPILER_COMPONENT: &str = "rustc";

/// Package name the toolchain overlay registers
pub const TOOLCHAIN_PACKAGE: &str = "rust-toolchain";

/// Directory (relative to the project) where artifacts are published
pub const OUTPUT_DIR: &str = "result";

/// Project-local working directory (cargo target dir)
pub const WORK_DIR: &str = ".pinenv";

/// Host tools appended after the plan's own search path
pub const SYSTEM_PATH: &str = "/usr/bin:/bin";

/// Ambient variables forwarded into the build invocation
pub const BUILD_ENV_ALLOWLIST: &[&str] = &["HOME", "USER", "TERM", "CARGO_HOME"];

/// Fallback shell for `pinenv shell`
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Target triple pinenv itself was built for
pub fn host_target() -> &'static str {
    option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or(FALLBACK_TARGET)
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
const FALLBACK_TARGET: &str = "x86_64-unknown-linux-gnu";
#[cfg(all(target_os = "linux", target_arch = "aarch64"))]
const FALLBACK_TARGET: &str = "aarch64-unknown-linux-gnu";
#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
const FALLBACK_TARGET: &str = "aarch64-apple-darwin";
#[cfg(all(target_os = "macos", target_arch = "x86_64"))]
const FALLBACK_TARGET: &str = "x86_64-apple-darwin";
#[cfg(not(any(
    all(target_os = "linux", target_arch = "x86_64"),
    all(target_os = "linux", target_arch = "aarch64"),
    all(target_os = "macos", target_arch = "aarch64"),
    all(target_os = "macos", target_arch = "x86_64"),
)))]
const FALLBACK_TARGET: &str = "unknown";
