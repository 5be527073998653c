//! Global configuration management
//!
//! Reads global settings from `config.toml` in the config directory: the
//! dist server, where toolchains are installed, default build jobs and
//! output preferences. A missing file means defaults.

use crate::infra::dirs::PinenvDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Global configuration error types
#[derive(Error, Debug)]
pub enum GlobalConfigError {
    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    ReadError { path: String, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    ParseError { path: String, error: String },
}

/// Global configuration for pinenv
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Dist server settings
    #[serde(default)]
    pub dist: DistConfig,

    /// Toolchain install settings
    #[serde(default)]
    pub toolchains: ToolchainsConfig,

    /// Default build options
    #[serde(default)]
    pub build: BuildConfig,

    /// Output preferences
    #[serde(default)]
    pub output: OutputConfig,
}

/// Dist server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DistConfig {
    /// Custom dist server URL
    pub server: Option<String>,

    /// Never contact the dist server
    pub offline: Option<bool>,
}

/// Toolchain configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolchainsConfig {
    /// Directory holding installed toolchains
    pub dir: Option<PathBuf>,

    /// Default target triple
    pub target: Option<String>,
}

/// Default build options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Default number of parallel jobs
    pub jobs: Option<usize>,
}

/// Output preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Enable quiet mode
    pub quiet: Option<bool>,

    /// Enable JSON output
    pub json: Option<bool>,
}

impl GlobalConfig {
    /// Load global configuration from the config directory
    pub fn load(dirs: &PinenvDirs) -> Result<Self, GlobalConfigError> {
        Self::load_from_path(&dirs.global_config_path())
    }

    /// Load global configuration from a specific path
    ///
    /// If the file doesn't exist, returns the default configuration.
    pub fn load_from_path(path: &Path) -> Result<Self, GlobalConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| GlobalConfigError::ReadError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| GlobalConfigError::ParseError {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Effective dist server URL
    #[must_use]
    pub fn dist_server(&self) -> &str {
        self.dist
            .server
            .as_deref()
            .unwrap_or(crate::config::urls::DIST_SERVER)
    }

    /// Whether the dist server must not be contacted
    #[must_use]
    pub fn offline(&self) -> bool {
        self.dist.offline.unwrap_or(false)
    }

    /// Effective toolchains directory
    #[must_use]
    pub fn toolchains_dir(&self, dirs: &PinenvDirs) -> PathBuf {
        self.toolchains
            .dir
            .clone()
            .unwrap_or_else(|| dirs.toolchains_dir())
    }

    /// Effective number of build jobs
    #[must_use]
    pub fn build_jobs(&self) -> usize {
        self.build.jobs.unwrap_or_else(num_cpus::get)
    }
}
