//! Pin command implementation
//!
//! Implements `pinenv pin NAME ...`: record a new reference for an input and
//! rewrite the lock file atomically. Repository revisions are fetched once
//! so the lock records the hash of their tree.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use super::common;
use crate::cli::output::status;
use crate::cli::GlobalArgs;
use crate::core::pins::PinReference;
use crate::core::project::SourceProvider;
use crate::infra::filesystem;
use crate::infra::git::{self, SourceCache};

/// Pin options
#[derive(Debug, Default)]
pub struct PinOptions {
    pub name: String,
    /// Local tree, relative to the project
    pub path: Option<PathBuf>,
    /// Repository url
    pub git: Option<String>,
    /// Full commit id
    pub rev: Option<String>,
    /// Toolchain channel
    pub channel: Option<String>,
    /// Snapshot date
    pub date: Option<String>,
    /// Mark the input as an overlay
    pub overlay: bool,
    /// Do not record a content hash
    pub no_hash: bool,
}

impl PinOptions {
    fn reference(&self) -> Result<PinReference> {
        match (&self.path, &self.git, &self.rev, &self.channel, &self.date) {
            (Some(path), None, None, None, None) => Ok(PinReference::LocalPath { path: path.clone() }),
            (None, Some(url), Some(rev), None, None) => Ok(PinReference::RepositoryRevision {
                url: url.clone(),
                rev: rev.to_lowercase(),
            }),
            (None, None, None, Some(channel), Some(date)) => Ok(PinReference::ChannelDate {
                channel: channel.clone(),
                date: date.clone(),
            }),
            _ => bail!("Specify exactly one of --path, --git with --rev, or --channel with --date"),
        }
    }
}

/// Execute the pin command
pub async fn execute(global: &GlobalArgs, options: PinOptions) -> Result<i32> {
    let (dirs, _, project) = common::load(global)?;
    let reference = options.reference()?;

    let overlay = options.overlay.then_some(true);

    // Validates the reference and keeps the overlay flag of an existing pin
    let mut table = project.pins.repin(&options.name, reference.clone(), overlay, None)?;

    if !options.no_hash {
        if let PinReference::RepositoryRevision { .. } = reference {
            let spinner = global.output.spinner(&format!("Fetching {}...", options.name));
            let sources = SourceCache::new(project.root.clone(), dirs.repos_dir(), dirs.sources_dir());
            let tree = sources.materialize(table.resolve(&options.name)?);
            spinner.finish_and_clear();
            let hash = git::tree_hash(&tree?)?;
            table = project.pins.repin(&options.name, reference, overlay, Some(hash))?;
        }
    }
    let input = table.resolve(&options.name)?;

    let lock_path = project.lock_path();
    let content = table.to_toml().context("Failed to serialize lock file")?;
    filesystem::write_atomic(&lock_path, content.as_bytes())
        .with_context(|| format!("Failed to write {}", lock_path.display()))?;

    if global.output.json {
        global.output.print_json(&serde_json::json!({
            "name": input.name,
            "reference": input.reference,
            "hash": input.hash,
            "overlay": input.overlay,
        }))?;
    } else {
        global.output.status(
            status::SUCCESS,
            &format!("Pinned {} ({})", input.name, input.reference.kind()),
        );
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_requires_one_kind() {
        let options = PinOptions {
            name: "source".to_string(),
            path: Some(PathBuf::from("app")),
            channel: Some("nightly".to_string()),
            ..PinOptions::default()
        };
        assert!(options.reference().is_err());

        let options = PinOptions {
            name: "rust".to_string(),
            channel: Some("nightly".to_string()),
            date: Some("2021-01-15".to_string()),
            ..PinOptions::default()
        };
        assert!(matches!(
            options.reference().unwrap(),
            PinReference::ChannelDate { .. }
        ));
    }
}
