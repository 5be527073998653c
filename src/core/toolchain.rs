//! Toolchain resolution
//!
//! A toolchain can be requested three ways: a `rust-toolchain.toml` file, an
//! explicit channel + date, or an override declared by an overlay. They are
//! modeled as one [`ToolchainRequest`] and chosen by a single prioritized
//! dispatch: toolchain file, then explicit channel, then overlay override.
//!
//! Resolution is exact. A channel + date with no snapshot at that date is
//! [`ToolchainError::ToolchainUnavailable`]; there is no nearest-date fallback.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::defaults::{BASE_COMPONENTS, COMPILER_COMPONENT, DEFAULT_TOOLCHAIN_PROFILE};
use crate::core::dist::{ChannelSnapshot, SnapshotIndex};
use crate::error::ToolchainError;

const MOVING_CHANNELS: &[&str] = &["nightly", "beta", "stable"];

/// A channel selection with optional date and component extensions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// `nightly`, `beta`, `stable` or a release version like `1.49.0`
    pub channel: String,

    /// Snapshot date (YYYY-MM-DD)
    #[serde(default)]
    pub date: Option<String>,

    /// Components requested on top of the profile
    #[serde(default)]
    pub components: Vec<String>,

    /// rustup profile the component set starts from
    #[serde(default)]
    pub profile: Option<String>,
}

impl ChannelSpec {
    /// Create a spec for `channel` at `date`
    pub fn new(channel: &str, date: Option<&str>) -> Self {
        Self {
            channel: channel.to_string(),
            date: date.map(str::to_string),
            ..Self::default()
        }
    }

    /// Add component extensions
    #[must_use]
    pub fn with_components(mut self, components: &[String]) -> Self {
        self.components.extend(components.iter().cloned());
        self
    }

    /// Split an embedded date (`nightly-2021-01-15`) and validate the result
    pub fn normalize(mut self) -> Result<Self, ToolchainError> {
        if let Some(captures) = dated_channel_regex().captures(&self.channel) {
            let channel = captures[1].to_string();
            let embedded = captures[2].to_string();
            if let Some(date) = &self.date {
                if *date != embedded {
                    return Err(ToolchainError::InvalidChannel {
                        channel: self.channel.clone(),
                        reason: format!("embedded date {embedded} conflicts with date {date}"),
                    });
                }
            }
            self.channel = channel;
            self.date = Some(embedded);
        }

        let moving = MOVING_CHANNELS.contains(&self.channel.as_str());
        if !moving && semver::Version::parse(&self.channel).is_err() {
            return Err(ToolchainError::InvalidChannel {
                channel: self.channel.clone(),
                reason: "expected nightly, beta, stable or a release version like 1.49.0"
                    .to_string(),
            });
        }

        match &self.date {
            Some(date) => {
                NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
                    ToolchainError::InvalidDate {
                        date: date.clone(),
                        reason: e.to_string(),
                    }
                })?;
            }
            None if moving => {
                return Err(ToolchainError::UnpinnedChannel {
                    channel: self.channel.clone(),
                });
            }
            None => {}
        }

        Ok(self)
    }

    /// Toolchain identifier, e.g. `nightly-2021-01-15` or `1.49.0`
    pub fn id(&self) -> String {
        match &self.date {
            Some(date) => format!("{}-{date}", self.channel),
            None => self.channel.clone(),
        }
    }
}

fn dated_channel_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(nightly|beta|stable)-(\d{4}-\d{2}-\d{2})$").expect("valid channel regex")
    })
}

/// A parsed `rust-toolchain.toml` (or legacy one-line `rust-toolchain`)
///
/// A `profile` key is accepted and ignored: a pinned file's components are
/// taken verbatim on top of the base set, never expanded from a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainFile {
    pub channel: String,
    pub components: Vec<String>,
    pub targets: Vec<String>,
}

#[derive(Deserialize)]
struct ToolchainFileToml {
    toolchain: ToolchainSection,
}

#[derive(Deserialize)]
struct ToolchainSection {
    channel: Option<String>,
    #[serde(default)]
    components: Vec<String>,
    #[serde(default)]
    targets: Vec<String>,
    profile: Option<String>,
    path: Option<String>,
}

impl ToolchainFile {
    /// Parse file content; `path` is used for error messages
    pub fn parse(content: &str, path: &Path) -> Result<Self, ToolchainError> {
        let invalid = |reason: String| ToolchainError::InvalidManifest {
            path: path.to_path_buf(),
            reason,
        };

        let trimmed = content.trim();
        if !trimmed.is_empty() && !trimmed.contains('\n') && !trimmed.contains('=') {
            return Ok(Self {
                channel: trimmed.to_string(),
                components: Vec::new(),
                targets: Vec::new(),
            });
        }

        let parsed: ToolchainFileToml =
            toml::from_str(content).map_err(|e| invalid(e.to_string()))?;
        if parsed.toolchain.path.is_some() {
            return Err(invalid(
                "custom toolchain paths are not reproducible; pin a channel instead".to_string(),
            ));
        }
        if let Some(profile) = &parsed.toolchain.profile {
            tracing::debug!("Ignoring profile '{profile}' in {}", path.display());
        }
        let channel = parsed
            .toolchain
            .channel
            .ok_or_else(|| invalid("missing toolchain.channel".to_string()))?;

        Ok(Self {
            channel,
            components: parsed.toolchain.components,
            targets: parsed.toolchain.targets,
        })
    }

    /// Read and parse a toolchain file
    pub fn load(path: &Path) -> Result<Self, ToolchainError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ToolchainError::InvalidManifest {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Self::parse(&content, path)
    }
}

/// A toolchain request in one of its three forms
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolchainRequest {
    /// Toolchain file pin; its component list is used verbatim
    ManifestPin { path: PathBuf, file: ToolchainFile },
    /// Explicit channel + date
    ChannelDatePin(ChannelSpec),
    /// Toolchain declared by an overlay
    OverlayOverride { overlay: String, spec: ChannelSpec },
}

impl ToolchainRequest {
    /// Pick the most specific request
    ///
    /// Priority: toolchain file > explicit channel > overlay override. Among
    /// overlay overrides the last-applied overlay wins, matching the overlay
    /// tie-break rule.
    pub fn select(
        manifest: Option<(PathBuf, ToolchainFile)>,
        explicit: Option<ChannelSpec>,
        overrides: &[(String, ChannelSpec)],
    ) -> Result<Self, ToolchainError> {
        let request = if let Some((path, file)) = manifest {
            Self::ManifestPin { path, file }
        } else if let Some(spec) = explicit {
            Self::ChannelDatePin(spec)
        } else if let Some((overlay, spec)) = overrides.last() {
            Self::OverlayOverride {
                overlay: overlay.clone(),
                spec: spec.clone(),
            }
        } else {
            return Err(ToolchainError::NoToolchainRequest);
        };

        tracing::debug!("Toolchain request: {}", request.describe());
        Ok(request)
    }

    /// Normalized channel spec of the request
    pub fn spec(&self) -> Result<ChannelSpec, ToolchainError> {
        match self {
            Self::ManifestPin { file, .. } => ChannelSpec {
                channel: file.channel.clone(),
                date: None,
                components: file.components.clone(),
                profile: None,
            }
            .normalize(),
            Self::ChannelDatePin(spec) | Self::OverlayOverride { spec, .. } => {
                spec.clone().normalize()
            }
        }
    }

    /// Human readable origin of the request
    pub fn describe(&self) -> String {
        match self {
            Self::ManifestPin { path, .. } => format!("toolchain file {}", path.display()),
            Self::ChannelDatePin(spec) => format!("channel {}", spec.id()),
            Self::OverlayOverride { overlay, spec } => {
                format!("overlay '{overlay}' override {}", spec.id())
            }
        }
    }
}

/// Fully specified toolchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainDescription {
    pub channel: String,
    pub date: Option<String>,
    /// Compiler version reported by the snapshot
    pub version: Option<String>,
    /// Ordered, deduplicated; contains exactly one compiler
    pub components: Vec<String>,
    /// Additional targets (`rust-std` installed for each)
    pub extra_targets: Vec<String>,
    pub target: String,
    /// Install root of the toolchain
    pub prefix: PathBuf,
    /// How the toolchain was requested
    pub request: String,
}

impl ToolchainDescription {
    /// Toolchain identifier, e.g. `nightly-2021-01-15`
    pub fn id(&self) -> String {
        match &self.date {
            Some(date) => format!("{}-{date}", self.channel),
            None => self.channel.clone(),
        }
    }

    /// Directory holding the toolchain binaries
    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    /// Path to the compiler
    pub fn rustc(&self) -> PathBuf {
        self.bin_dir().join("rustc")
    }

    /// Path to the build tool
    pub fn cargo(&self) -> PathBuf {
        self.bin_dir().join("cargo")
    }

    /// Whether the component set includes `component`
    pub fn has_component(&self, component: &str) -> bool {
        self.components.iter().any(|c| c == component)
    }

    /// Whether the toolchain's compiler exists on disk
    pub fn is_installed(&self) -> bool {
        self.rustc().is_file()
    }

    /// Fail unless the toolchain is installed under its prefix
    pub fn ensure_installed(&self) -> Result<(), ToolchainError> {
        if self.is_installed() {
            Ok(())
        } else {
            Err(ToolchainError::NotInstalled {
                toolchain: self.id(),
                path: self.prefix.clone(),
            })
        }
    }
}

/// Environment-dependent inputs to resolution
#[derive(Debug, Clone)]
pub struct ResolveSettings {
    /// Target triple to build for
    pub target: String,
    /// Directory holding installed toolchains (`<channel>[-<date>]-<target>`)
    pub toolchains_dir: PathBuf,
}

/// Resolve a request into a toolchain description
pub fn resolve(
    request: &ToolchainRequest,
    index: &dyn SnapshotIndex,
    settings: &ResolveSettings,
) -> Result<ToolchainDescription, ToolchainError> {
    let spec = request.spec()?;
    let toolchain_id = spec.id();
    let target = settings.target.clone();

    let snapshot = index
        .snapshot(&spec.channel, spec.date.as_deref())?
        .ok_or_else(|| ToolchainError::ToolchainUnavailable {
            channel: spec.channel.clone(),
            date: spec.date.clone().unwrap_or_else(|| "release".to_string()),
        })?;

    if let Some(date) = &spec.date {
        if snapshot.date() != date {
            return Err(ToolchainError::ToolchainUnavailable {
                channel: spec.channel.clone(),
                date: date.clone(),
            });
        }
    }

    if !snapshot.offers(COMPILER_COMPONENT, &target) {
        return Err(ToolchainError::TargetUnavailable {
            target,
            toolchain: toolchain_id,
        });
    }

    let base: Vec<String> = match request {
        ToolchainRequest::ManifestPin { .. } => {
            BASE_COMPONENTS.iter().map(|c| (*c).to_string()).collect()
        }
        _ => profile_components(
            &snapshot,
            spec.profile.as_deref().unwrap_or(DEFAULT_TOOLCHAIN_PROFILE),
        ),
    };
    let components = component_set(base, &spec.components);

    for component in &components {
        if !snapshot.offers(component, &target) {
            return Err(ToolchainError::ComponentUnavailable {
                component: component.clone(),
                toolchain: toolchain_id,
            });
        }
    }

    let extra_targets = match request {
        ToolchainRequest::ManifestPin { file, .. } => file.targets.clone(),
        _ => Vec::new(),
    };
    for extra in &extra_targets {
        if !snapshot.offers("rust-std", extra) {
            return Err(ToolchainError::TargetUnavailable {
                target: extra.clone(),
                toolchain: toolchain_id,
            });
        }
    }

    let install_name = format!("{toolchain_id}-{target}");
    let description = ToolchainDescription {
        channel: spec.channel.clone(),
        date: spec.date.clone(),
        version: snapshot.rustc_version().map(str::to_string),
        components,
        extra_targets,
        prefix: settings.toolchains_dir.join(install_name),
        target,
        request: request.describe(),
    };

    tracing::info!(
        "Resolved toolchain {} ({}) from {}",
        description.id(),
        description.version.as_deref().unwrap_or("unknown version"),
        description.request
    );
    Ok(description)
}

/// Components of a profile, mapped back to their canonical names
fn profile_components(snapshot: &ChannelSnapshot, profile: &str) -> Vec<String> {
    let Some(packages) = snapshot.profile(profile) else {
        return BASE_COMPONENTS.iter().map(|c| (*c).to_string()).collect();
    };

    packages
        .iter()
        .map(|package| {
            snapshot
                .manifest
                .renames
                .iter()
                .find(|(_, rename)| rename.to == *package)
                .map_or_else(|| package.clone(), |(canonical, _)| canonical.clone())
        })
        .collect()
}

/// Profile components followed by extensions; compiler first, no duplicates
fn component_set(base: Vec<String>, extensions: &[String]) -> Vec<String> {
    let mut components = vec![COMPILER_COMPONENT.to_string()];
    for component in base.into_iter().chain(extensions.iter().cloned()) {
        if !components.contains(&component) {
            components.push(component);
        }
    }
    components
}
