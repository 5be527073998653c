//! Platform-specific directory management
//!
//! Provides platform-specific paths for cache, config, and data directories.
//! Follows XDG Base Directory Specification on Linux and standard locations on macOS.
//!
//! Environment variables can override default directories:
//! - `PINENV_CACHE_DIR` - Override cache directory
//! - `PINENV_CONFIG_DIR` - Override config directory
//! - `PINENV_DATA_DIR` - Override data directory
//! - `PINENV_TOOLCHAINS_DIR` - Override toolchain install directory

use std::env;
use std::path::PathBuf;

/// Environment variable names for directory overrides
pub const ENV_CACHE_DIR: &str = "PINENV_CACHE_DIR";
pub const ENV_CONFIG_DIR: &str = "PINENV_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "PINENV_DATA_DIR";
pub const ENV_TOOLCHAINS_DIR: &str = "PINENV_TOOLCHAINS_DIR";

/// Application name used in directory paths
const APP_NAME: &str = "pinenv";

/// Subdirectory names
const DIST_SUBDIR: &str = "dist";
const SOURCES_SUBDIR: &str = "sources";
const REPOS_SUBDIR: &str = "repos";

/// Platform-specific directory provider for pinenv
#[derive(Debug, Clone)]
pub struct PinenvDirs {
    cache_dir: PathBuf,
    config_dir: PathBuf,
    data_dir: PathBuf,
    toolchains_dir: PathBuf,
}

impl PinenvDirs {
    /// Create a new `PinenvDirs` instance
    ///
    /// Checks environment variables first, then falls back to platform defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache_dir: Self::resolve(ENV_CACHE_DIR, Self::platform_cache_dir),
            config_dir: Self::resolve(ENV_CONFIG_DIR, Self::platform_config_dir),
            data_dir: Self::resolve(ENV_DATA_DIR, Self::platform_data_dir),
            toolchains_dir: Self::resolve(ENV_TOOLCHAINS_DIR, Self::rustup_toolchains_dir),
        }
    }

    /// Get the cache directory path
    ///
    /// - Linux: `$XDG_CACHE_HOME/pinenv` or `~/.cache/pinenv`
    /// - macOS: `~/Library/Caches/pinenv`
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone()
    }

    /// Get the config directory path
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Get the data directory path
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    /// Directory holding installed toolchains
    ///
    /// Defaults to rustup's layout so toolchains installed with
    /// `rustup toolchain install nightly-2021-01-15` are found as is.
    #[must_use]
    pub fn toolchains_dir(&self) -> PathBuf {
        self.toolchains_dir.clone()
    }

    /// Cached channel manifests, laid out like the dist server
    #[must_use]
    pub fn dist_cache_dir(&self) -> PathBuf {
        self.cache_dir.join(DIST_SUBDIR)
    }

    /// Exported source trees, one per revision
    #[must_use]
    pub fn sources_dir(&self) -> PathBuf {
        self.cache_dir.join(SOURCES_SUBDIR)
    }

    /// Bare repositories fetched for revision pins
    #[must_use]
    pub fn repos_dir(&self) -> PathBuf {
        self.data_dir.join(REPOS_SUBDIR)
    }

    /// Get the global config file path
    #[must_use]
    pub fn global_config_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    fn resolve(var: &str, fallback: fn() -> PathBuf) -> PathBuf {
        match env::var(var) {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => fallback(),
        }
    }

    /// Get platform-specific cache directory
    fn platform_cache_dir() -> PathBuf {
        dirs::cache_dir().map_or_else(
            || Self::home().join(".cache").join(APP_NAME),
            |p| p.join(APP_NAME),
        )
    }

    /// Get platform-specific config directory
    fn platform_config_dir() -> PathBuf {
        dirs::config_dir().map_or_else(
            || Self::home().join(".config").join(APP_NAME),
            |p| p.join(APP_NAME),
        )
    }

    /// Get platform-specific data directory
    fn platform_data_dir() -> PathBuf {
        dirs::data_dir().map_or_else(
            || Self::home().join(".local").join("share").join(APP_NAME),
            |p| p.join(APP_NAME),
        )
    }

    /// `$RUSTUP_HOME/toolchains`, or `~/.rustup/toolchains`
    fn rustup_toolchains_dir() -> PathBuf {
        match env::var("RUSTUP_HOME") {
            Ok(home) if !home.is_empty() => PathBuf::from(home).join("toolchains"),
            _ => Self::home().join(".rustup").join("toolchains"),
        }
    }

    fn home() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
    }
}

impl Default for PinenvDirs {
    fn default() -> Self {
        Self::new()
    }
}
