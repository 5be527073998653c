//! Channel manifest retrieval
//!
//! Channel manifests live in the dist cache laid out exactly like the dist
//! server (`<date>/channel-rust-<channel>.toml`). [`DirectorySnapshots`]
//! serves them to the resolver; [`DistClient`] fills the cache.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::core::dist::{snapshot_path, ChannelSnapshot, SnapshotIndex};
use crate::error::{DistError, ToolchainError};
use crate::infra::filesystem;

/// Snapshot index over a directory of cached channel manifests
#[derive(Debug, Clone)]
pub struct DirectorySnapshots {
    root: PathBuf,
}

impl DirectorySnapshots {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Cached manifest path for `channel` at `date`
    pub fn path_for(&self, channel: &str, date: Option<&str>) -> PathBuf {
        self.root.join(snapshot_path(channel, date))
    }

    pub fn contains(&self, channel: &str, date: Option<&str>) -> bool {
        self.path_for(channel, date).is_file()
    }
}

impl SnapshotIndex for DirectorySnapshots {
    fn snapshot(
        &self,
        channel: &str,
        date: Option<&str>,
    ) -> Result<Option<ChannelSnapshot>, ToolchainError> {
        let path = self.path_for(channel, date);
        if !path.is_file() {
            debug!("No snapshot at {}", path.display());
            return Ok(None);
        }

        let content = filesystem::read_file(&path).map_err(|e| ToolchainError::InvalidSnapshot {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let snapshot = ChannelSnapshot::from_toml(channel, &content, &path)?;

        if let Some(date) = date {
            if snapshot.date() != date {
                return Err(ToolchainError::InvalidSnapshot {
                    path,
                    reason: format!("manifest is dated {}, expected {date}", snapshot.date()),
                });
            }
        }
        Ok(Some(snapshot))
    }
}

/// HTTP client for the dist server
#[derive(Debug, Clone)]
pub struct DistClient {
    client: reqwest::Client,
    base_url: String,
}

impl DistClient {
    /// Create a client for `base_url` (e.g. `https://static.rust-lang.org/dist`)
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .connect_timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Manifest URL for `channel` at `date`
    pub fn manifest_url(&self, channel: &str, date: Option<&str>) -> String {
        let relative = snapshot_path(channel, date);
        format!("{}/{}", self.base_url, relative.to_string_lossy().replace('\\', "/"))
    }

    /// Fetch the manifest text, `None` if the server has no such snapshot
    pub async fn fetch_manifest(
        &self,
        channel: &str,
        date: Option<&str>,
    ) -> Result<Option<String>, DistError> {
        let url = self.manifest_url(channel, date);
        debug!("GET {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DistError::Network {
                url: url.clone(),
                error: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(DistError::Status {
                url,
                status: status.as_u16(),
            });
        }

        response.text().await.map(Some).map_err(|e| DistError::Network {
            url,
            error: e.to_string(),
        })
    }

    /// Download a snapshot into `cache_root` unless it is already there
    ///
    /// Returns `false` when the server has no snapshot for that date. The
    /// manifest is published atomically, so concurrent readers see either
    /// nothing or the complete file.
    pub async fn prefetch(
        &self,
        channel: &str,
        date: Option<&str>,
        cache_root: &Path,
    ) -> Result<bool, DistError> {
        let dest = cache_root.join(snapshot_path(channel, date));
        if dest.is_file() {
            return Ok(true);
        }

        let Some(content) = self.fetch_manifest(channel, date).await? else {
            return Ok(false);
        };

        filesystem::write_atomic(&dest, content.as_bytes()).map_err(|e| DistError::Cache {
            path: dest.clone(),
            error: e.to_string(),
        })?;
        info!("Cached channel manifest {}", dest.display());
        Ok(true)
    }
}
