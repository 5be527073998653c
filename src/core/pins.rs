//! Source pinning table
//!
//! The lock file (pinenv.lock) maps each logical input name to an immutable
//! content reference. It is loaded once and handed to every resolver call;
//! nothing in the core rewrites it. Re-pinning produces a new table.
//!
//! ```toml
//! version = 1
//!
//! [inputs.source]
//! kind = "repository-revision"
//! url = "https://github.com/jeff-hughes/shellcaster"
//! rev = "4a3bd7b08c2f8a3b8d0c0a7e0bb0fc3c9e7d8c11"
//!
//! [inputs.overlayA]
//! kind = "local-path"
//! path = "overlays/native"
//! overlay = true
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::defaults::LOCK_VERSION;
use crate::error::PinError;

/// Immutable content reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PinReference {
    /// A repository at an exact commit
    RepositoryRevision { url: String, rev: String },
    /// A toolchain channel snapshot at an exact date
    ChannelDate { channel: String, date: String },
    /// A tree on the local filesystem
    LocalPath { path: PathBuf },
}

impl PinReference {
    /// Kind tag as written in the lock file
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RepositoryRevision { .. } => "repository-revision",
            Self::ChannelDate { .. } => "channel-date",
            Self::LocalPath { .. } => "local-path",
        }
    }

    fn validate(&self, name: &str) -> Result<(), PinError> {
        let invalid = |reason: String| PinError::InvalidPin {
            name: name.to_string(),
            reason,
        };

        match self {
            Self::RepositoryRevision { url, rev } => {
                if url.trim().is_empty() {
                    return Err(invalid("repository url is empty".to_string()));
                }
                if rev.len() != 40 || !rev.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(invalid(format!(
                        "revision '{rev}' is not a full 40-character commit id"
                    )));
                }
            }
            Self::ChannelDate { channel, date } => {
                if channel.trim().is_empty() {
                    return Err(invalid("channel is empty".to_string()));
                }
                NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map_err(|e| invalid(format!("date '{date}' is not YYYY-MM-DD: {e}")))?;
            }
            Self::LocalPath { path } => {
                if path.as_os_str().is_empty() {
                    return Err(invalid("path is empty".to_string()));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for PinReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RepositoryRevision { url, rev } => write!(f, "{url}@{}", &rev[..rev.len().min(12)]),
            Self::ChannelDate { channel, date } => write!(f, "{channel}-{date}"),
            Self::LocalPath { path } => write!(f, "path:{}", path.display()),
        }
    }
}

/// A locked input entry as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LockedInput {
    #[serde(flatten)]
    reference: PinReference,

    /// SHA-256 of the materialized tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hash: Option<String>,

    /// Whether this input is a composable overlay
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    overlay: bool,
}

/// On-disk lock file layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LockFile {
    version: u32,
    #[serde(default)]
    inputs: BTreeMap<String, LockedInput>,
}

/// One pinned input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinnedInput {
    /// Logical input name (unique)
    pub name: String,
    /// Content reference
    pub reference: PinReference,
    /// Expected SHA-256 of the materialized tree
    pub hash: Option<String>,
    /// Whether the input is a composable overlay
    pub overlay: bool,
}

/// The loaded, immutable pin table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PinTable {
    inputs: BTreeMap<String, PinnedInput>,
}

impl PinTable {
    /// Build a table from pinned inputs, validating each
    pub fn new(inputs: impl IntoIterator<Item = PinnedInput>) -> Result<Self, PinError> {
        let mut table = BTreeMap::new();
        for input in inputs {
            validate_input(&input)?;
            table.insert(input.name.clone(), input);
        }
        Ok(Self { inputs: table })
    }

    /// Parse from TOML string
    pub fn from_toml(content: &str) -> Result<Self, PinError> {
        Self::parse(content, Path::new(crate::config::defaults::LOCK_FILE))
    }

    /// Load from a lock file on disk
    pub fn load(path: &Path) -> Result<Self, PinError> {
        let content = std::fs::read_to_string(path).map_err(|e| PinError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        let table = Self::parse(&content, path)?;
        tracing::debug!("Loaded {} pins from {}", table.len(), path.display());
        Ok(table)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, PinError> {
        let lock: LockFile = toml::from_str(content).map_err(|e| PinError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        if lock.version != LOCK_VERSION {
            return Err(PinError::UnsupportedVersion {
                found: lock.version,
                expected: LOCK_VERSION,
            });
        }

        Self::new(lock.inputs.into_iter().map(|(name, locked)| PinnedInput {
            name,
            reference: locked.reference,
            hash: locked.hash,
            overlay: locked.overlay,
        }))
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        let lock = LockFile {
            version: LOCK_VERSION,
            inputs: self
                .inputs
                .values()
                .map(|input| {
                    (
                        input.name.clone(),
                        LockedInput {
                            reference: input.reference.clone(),
                            hash: input.hash.clone(),
                            overlay: input.overlay,
                        },
                    )
                })
                .collect(),
        };
        toml::to_string_pretty(&lock)
    }

    /// Look up a logical input name
    ///
    /// Never falls back to a default: an absent name is `UnknownInput`.
    pub fn resolve(&self, name: &str) -> Result<&PinnedInput, PinError> {
        self.inputs.get(name).ok_or_else(|| PinError::UnknownInput {
            name: name.to_string(),
        })
    }

    /// Return a new table with `name` pinned to `reference`
    ///
    /// The previous pin (if any) is left untouched in `self`. Its hash is
    /// never carried over since it described the old content; `hash` is
    /// recorded instead. `overlay: None` keeps the previous overlay flag.
    pub fn repin(
        &self,
        name: &str,
        reference: PinReference,
        overlay: Option<bool>,
        hash: Option<String>,
    ) -> Result<Self, PinError> {
        let previous = self.inputs.get(name);
        let input = PinnedInput {
            name: name.to_string(),
            reference,
            hash,
            overlay: overlay.unwrap_or_else(|| previous.is_some_and(|p| p.overlay)),
        };
        validate_input(&input)?;

        let mut inputs = self.inputs.clone();
        inputs.insert(name.to_string(), input);
        Ok(Self { inputs })
    }

    /// Iterate pins in name order
    pub fn iter(&self) -> impl Iterator<Item = &PinnedInput> {
        self.inputs.values()
    }

    /// Pins flagged as overlays, in name order
    pub fn overlays(&self) -> impl Iterator<Item = &PinnedInput> {
        self.inputs.values().filter(|input| input.overlay)
    }

    /// Number of pins
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

fn validate_input(input: &PinnedInput) -> Result<(), PinError> {
    if input.name.trim().is_empty() {
        return Err(PinError::InvalidPin {
            name: input.name.clone(),
            reason: "input name is empty".to_string(),
        });
    }
    input.reference.validate(&input.name)?;

    if let Some(hash) = &input.hash {
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PinError::InvalidPin {
                name: input.name.clone(),
                reason: format!("hash '{hash}' is not a SHA-256 hex digest"),
            });
        }
    }
    Ok(())
}
