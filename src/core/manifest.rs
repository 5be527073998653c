//! Project file (pinenv.toml) parsing
//!
//! The project file names the inputs (by their logical pin names), the
//! toolchain request, the dependency lists and the development shell. It
//! never contains content references; those live in the lock file.
//!
//! ```toml
//! [project]
//! name = "shellcaster"
//! overlays = ["overlayA"]
//!
//! [toolchain]
//! channel = "nightly"
//! date = "2021-01-15"
//!
//! [dependencies]
//! build = ["pkg-config"]
//! runtime = ["openssl", "sqlite"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::defaults::{DEFAULT_SHELL, DEFAULT_SOURCE_INPUT};
use crate::core::environment::{Guard, Hook};
use crate::core::pins::{PinReference, PinTable};
use crate::core::plan::Profile;
use crate::core::toolchain::ChannelSpec;
use crate::error::{EnvironmentError, PinError, PinenvError};

/// The project file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProjectManifest {
    /// Project configuration
    pub project: ProjectConfig,

    /// Toolchain request
    #[serde(default)]
    pub toolchain: ToolchainConfig,

    /// Dependency lists
    #[serde(default)]
    pub dependencies: DependencyConfig,

    /// Development shell
    #[serde(default)]
    pub shell: ShellConfig,
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Artifact (binary) name; defaults to the project name
    #[serde(default)]
    pub artifact: Option<String>,

    /// Input holding the application source
    #[serde(default = "default_source")]
    pub source: String,

    /// Input holding the base `packages.toml`
    #[serde(default)]
    pub packages: Option<String>,

    /// Overlay inputs, in application order
    #[serde(default)]
    pub overlays: Vec<String>,

    /// Cargo profile
    #[serde(default)]
    pub profile: Profile,
}

fn default_source() -> String {
    DEFAULT_SOURCE_INPUT.to_string()
}

/// `[toolchain]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ToolchainConfig {
    /// Toolchain file, relative to the source tree
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Channel (may embed a date)
    #[serde(default)]
    pub channel: Option<String>,

    /// Snapshot date
    #[serde(default)]
    pub date: Option<String>,

    /// Input pinned as `channel-date`
    #[serde(default)]
    pub input: Option<String>,

    /// Components added to the profile
    #[serde(default)]
    pub components: Vec<String>,

    /// rustup profile
    #[serde(default)]
    pub profile: Option<String>,

    /// Target triple; defaults to the configured or host target
    #[serde(default)]
    pub target: Option<String>,
}

/// `[dependencies]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DependencyConfig {
    /// Build-time only packages
    #[serde(default)]
    pub build: Vec<String>,

    /// Build and run time packages
    #[serde(default)]
    pub runtime: Vec<String>,
}

/// `[shell]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ShellConfig {
    /// Shell program; defaults to `$SHELL`, then `/bin/sh`
    #[serde(default)]
    pub program: Option<String>,

    /// Bindings: variable name -> template
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Lifecycle hooks in order
    #[serde(default)]
    pub hooks: Vec<HookConfig>,
}

/// `[[shell.hooks]]` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HookConfig {
    pub name: String,
    pub run: String,
    /// Guard: `always`, `interactive`, `batch` or `env-set:VAR`
    #[serde(default = "default_guard")]
    pub when: String,
    #[serde(default)]
    pub teardown: Option<String>,
}

fn default_guard() -> String {
    "always".to_string()
}

impl ProjectManifest {
    /// Load the project file
    pub fn load(path: &Path) -> Result<Self, PinenvError> {
        if !path.is_file() {
            return Err(PinenvError::ManifestNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| PinenvError::ManifestRead {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml(&content).map_err(|source| PinenvError::ManifestParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse from TOML string
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Artifact name
    pub fn artifact(&self) -> &str {
        self.project
            .artifact
            .as_deref()
            .unwrap_or(&self.project.name)
    }

    /// Shell program to spawn
    pub fn shell_program(&self) -> String {
        self.shell
            .program
            .clone()
            .or_else(|| std::env::var("SHELL").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| DEFAULT_SHELL.to_string())
    }

    /// Explicit channel request, inline or through a `channel-date` pin
    ///
    /// A pinned `input` takes precedence over an inline `channel`.
    pub fn explicit_channel(&self, pins: &PinTable) -> Result<Option<ChannelSpec>, PinError> {
        let toolchain = &self.toolchain;
        let spec = if let Some(input) = &toolchain.input {
            let pinned = pins.resolve(input)?;
            match &pinned.reference {
                PinReference::ChannelDate { channel, date } => {
                    ChannelSpec::new(channel, Some(date))
                }
                other => {
                    return Err(PinError::WrongKind {
                        name: input.clone(),
                        found: other.kind().to_string(),
                        expected: "channel-date".to_string(),
                    })
                }
            }
        } else if let Some(channel) = &toolchain.channel {
            ChannelSpec::new(channel, toolchain.date.as_deref())
        } else {
            return Ok(None);
        };

        let mut spec = spec.with_components(&toolchain.components);
        spec.profile.clone_from(&toolchain.profile);
        Ok(Some(spec))
    }

    /// Hooks with parsed guards
    pub fn hooks(&self) -> Result<Vec<Hook>, EnvironmentError> {
        self.shell
            .hooks
            .iter()
            .map(|hook| {
                Ok(Hook {
                    name: hook.name.clone(),
                    run: hook.run.clone(),
                    guard: Guard::parse(&hook.name, &hook.when)?,
                    teardown: hook.teardown.clone(),
                })
            })
            .collect()
    }
}
