//! Toolchain channel snapshots
//!
//! A snapshot is one channel manifest (`channel-rust-<channel>.toml`) as
//! published by the Rust dist server for one exact date. Snapshots are looked
//! up through the [`SnapshotIndex`] trait so the resolver never touches the
//! network or the filesystem directly.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ToolchainError;

/// Component availability for one target
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TargetEntry {
    #[serde(default)]
    pub available: bool,
}

/// One package (component) of the channel manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageEntry {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub target: BTreeMap<String, TargetEntry>,
}

/// Component rename (e.g. `clippy` -> `clippy-preview`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Rename {
    pub to: String,
}

/// Parsed channel manifest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChannelManifest {
    pub manifest_version: String,
    pub date: String,
    #[serde(default)]
    pub pkg: BTreeMap<String, PackageEntry>,
    #[serde(default)]
    pub renames: BTreeMap<String, Rename>,
    #[serde(default)]
    pub profiles: BTreeMap<String, Vec<String>>,
}

/// A channel manifest bound to the channel it was requested for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub channel: String,
    pub manifest: ChannelManifest,
}

impl ChannelSnapshot {
    /// Parse a channel manifest for `channel`
    pub fn from_toml(channel: &str, content: &str, origin: &Path) -> Result<Self, ToolchainError> {
        let manifest: ChannelManifest =
            toml::from_str(content).map_err(|e| ToolchainError::InvalidSnapshot {
                path: origin.to_path_buf(),
                reason: e.to_string(),
            })?;

        if manifest.manifest_version != "2" {
            return Err(ToolchainError::InvalidSnapshot {
                path: origin.to_path_buf(),
                reason: format!(
                    "unsupported manifest-version '{}'",
                    manifest.manifest_version
                ),
            });
        }

        Ok(Self {
            channel: channel.to_string(),
            manifest,
        })
    }

    /// Snapshot date as recorded in the manifest
    pub fn date(&self) -> &str {
        &self.manifest.date
    }

    /// Name the component is published under in this manifest
    pub fn package_name<'a>(&'a self, component: &'a str) -> &'a str {
        self.manifest
            .renames
            .get(component)
            .map_or(component, |rename| rename.to.as_str())
    }

    /// Whether `component` is available for `target`
    ///
    /// Target-independent components (like `rust-src`) are published under
    /// the `*` target.
    pub fn offers(&self, component: &str, target: &str) -> bool {
        let Some(entry) = self.manifest.pkg.get(self.package_name(component)) else {
            return false;
        };
        [target, "*"]
            .iter()
            .any(|t| entry.target.get(*t).is_some_and(|e| e.available))
    }

    /// Components of a rustup profile, if the manifest defines profiles
    pub fn profile(&self, name: &str) -> Option<&[String]> {
        self.manifest.profiles.get(name).map(Vec::as_slice)
    }

    /// Compiler version string (e.g. `1.51.0-nightly (d98d2f57d 2021-01-14)`)
    pub fn rustc_version(&self) -> Option<&str> {
        self.manifest
            .pkg
            .get("rustc")
            .map(|p| p.version.as_str())
            .filter(|v| !v.is_empty())
    }
}

/// Source of channel snapshots
pub trait SnapshotIndex {
    /// Return the snapshot for exactly `channel` at `date`, or `None`
    ///
    /// Implementations must never substitute a snapshot from another date.
    fn snapshot(
        &self,
        channel: &str,
        date: Option<&str>,
    ) -> Result<Option<ChannelSnapshot>, ToolchainError>;
}

/// Relative location of a channel manifest, as laid out on the dist server
pub fn snapshot_path(channel: &str, date: Option<&str>) -> PathBuf {
    let file = format!("channel-rust-{channel}.toml");
    match date {
        Some(date) => PathBuf::from(date).join(file),
        None => PathBuf::from(file),
    }
}
