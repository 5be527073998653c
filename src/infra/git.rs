//! Source materialization
//!
//! Turns pinned inputs into directory trees. Local paths are used in place;
//! repository revisions are fetched with gix into a bare cache repository
//! and the pinned commit's tree is exported into `<cache>/sources/<rev>`.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::core::pins::{PinReference, PinnedInput};
use crate::core::project::SourceProvider;
use crate::error::SourceError;
use crate::infra::filesystem;

/// Directory names never included in a tree hash
const HASH_SKIP: &[&str] = &[".git"];

/// Source provider backed by the local cache
#[derive(Debug, Clone)]
pub struct SourceCache {
    /// Local-path pins resolve against this directory
    project_root: PathBuf,
    /// Bare repositories, one per url
    repos_dir: PathBuf,
    /// Exported trees, one per revision
    sources_dir: PathBuf,
}

impl SourceCache {
    pub fn new(project_root: PathBuf, repos_dir: PathBuf, sources_dir: PathBuf) -> Self {
        Self {
            project_root,
            repos_dir,
            sources_dir,
        }
    }

    fn local_path(&self, name: &str, path: &Path) -> Result<PathBuf, SourceError> {
        let full = self.project_root.join(path);
        if full.is_dir() {
            Ok(full)
        } else {
            Err(SourceError::PathNotFound {
                name: name.to_string(),
                path: full,
            })
        }
    }

    fn revision(&self, name: &str, url: &str, rev: &str) -> Result<PathBuf, SourceError> {
        let dest = self.sources_dir.join(rev);
        if dest.is_dir() {
            debug!("Using cached export of {name} at {rev}");
            return Ok(dest);
        }

        let repo = self.open_or_fetch(name, url, rev)?;
        export_tree(&repo, name, url, rev, &dest)?;
        info!("Exported {name} at {rev}");
        Ok(dest)
    }

    /// Bare cache repository holding `rev`
    fn open_or_fetch(&self, name: &str, url: &str, rev: &str) -> Result<gix::Repository, SourceError> {
        let repo_dir = self.repos_dir.join(repo_dir_name(url));
        let oid = parse_rev(name, url, rev)?;

        if repo_dir.is_dir() {
            if let Ok(repo) = gix::open(&repo_dir) {
                if repo.find_object(oid).is_ok() {
                    return Ok(repo);
                }
            }
            // Stale or broken cache repo: fetch it again from scratch
            std::fs::remove_dir_all(&repo_dir).map_err(|e| SourceError::Io {
                path: repo_dir.clone(),
                error: e.to_string(),
            })?;
        }

        filesystem::create_dir_all(&self.repos_dir).map_err(|e| SourceError::Io {
            path: self.repos_dir.clone(),
            error: e.to_string(),
        })?;

        info!("Fetching {url}");
        let fetch_err = |e: &dyn std::fmt::Display| SourceError::FetchFailed {
            name: name.to_string(),
            url: url.to_string(),
            error: e.to_string(),
        };
        let mut prepare = gix::prepare_clone_bare(url, &repo_dir).map_err(|e| fetch_err(&e))?;
        let (repo, _outcome) = prepare
            .fetch_only(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
            .map_err(|e| fetch_err(&e))?;

        if repo.find_object(oid).is_err() {
            return Err(SourceError::RevisionNotFound {
                name: name.to_string(),
                url: url.to_string(),
                rev: rev.to_string(),
            });
        }
        Ok(repo)
    }
}

impl SourceProvider for SourceCache {
    fn materialize(&self, input: &PinnedInput) -> Result<PathBuf, SourceError> {
        let tree = match &input.reference {
            PinReference::LocalPath { path } => self.local_path(&input.name, path)?,
            PinReference::RepositoryRevision { url, rev } => self.revision(&input.name, url, rev)?,
            PinReference::ChannelDate { .. } => {
                return Err(SourceError::NotATree {
                    name: input.name.clone(),
                    kind: input.reference.kind().to_string(),
                })
            }
        };

        if let Some(expected) = &input.hash {
            let actual = tree_hash(&tree)?;
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(SourceError::HashMismatch {
                    name: input.name.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(tree)
    }
}

fn parse_rev(name: &str, url: &str, rev: &str) -> Result<gix::ObjectId, SourceError> {
    gix::ObjectId::from_hex(rev.as_bytes()).map_err(|_| SourceError::RevisionNotFound {
        name: name.to_string(),
        url: url.to_string(),
        rev: rev.to_string(),
    })
}

/// Cache directory name for a repository url
fn repo_dir_name(url: &str) -> String {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    let stem = url
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .rsplit('/')
        .next()
        .unwrap_or("repo");
    format!("{stem}-{}", &digest[..16])
}

/// Write the tree of commit `rev` into `dest` through a staging dir
fn export_tree(
    repo: &gix::Repository,
    name: &str,
    url: &str,
    rev: &str,
    dest: &Path,
) -> Result<(), SourceError> {
    let export_err = |e: &dyn std::fmt::Display| SourceError::ExportFailed {
        name: name.to_string(),
        rev: rev.to_string(),
        error: e.to_string(),
    };

    let oid = parse_rev(name, url, rev)?;
    let commit = repo
        .find_object(oid)
        .map_err(|e| export_err(&e))?
        .try_into_commit()
        .map_err(|e| export_err(&e))?;
    let tree = commit.tree().map_err(|e| export_err(&e))?;

    let mut recorder = gix::traverse::tree::Recorder::default();
    tree.traverse()
        .breadthfirst(&mut recorder)
        .map_err(|e| export_err(&e))?;

    let staged = filesystem::staging_dir_for(dest).map_err(|e| export_err(&e))?;
    for entry in &recorder.records {
        let relative = gix::path::try_from_byte_slice(&entry.filepath).map_err(|e| export_err(&e))?;
        let path = staged.path().join(relative);
        let io_err = |e: std::io::Error| SourceError::Io {
            path: path.clone(),
            error: e.to_string(),
        };

        match entry.mode.kind() {
            gix::object::tree::EntryKind::Tree => {
                std::fs::create_dir_all(&path).map_err(io_err)?;
            }
            gix::object::tree::EntryKind::Blob | gix::object::tree::EntryKind::BlobExecutable => {
                let blob = repo.find_object(entry.oid).map_err(|e| export_err(&e))?;
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(io_err)?;
                }
                std::fs::write(&path, &blob.data).map_err(io_err)?;
                #[cfg(unix)]
                if entry.mode.kind() == gix::object::tree::EntryKind::BlobExecutable {
                    use std::os::unix::fs::PermissionsExt;
                    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                        .map_err(io_err)?;
                }
            }
            gix::object::tree::EntryKind::Link => {
                let blob = repo.find_object(entry.oid).map_err(|e| export_err(&e))?;
                let target = String::from_utf8_lossy(&blob.data).into_owned();
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(io_err)?;
                }
                #[cfg(unix)]
                std::os::unix::fs::symlink(&target, &path).map_err(io_err)?;
                #[cfg(not(unix))]
                std::fs::write(&path, target).map_err(io_err)?;
            }
            // Submodules are not exported
            gix::object::tree::EntryKind::Commit => {}
        }
    }

    filesystem::publish_dir(staged, dest).map_err(|e| export_err(&e))
}

/// SHA-256 over a tree's sorted relative paths and file contents
///
/// Symlinks contribute their target instead of content; `.git` is skipped.
pub fn tree_hash(root: &Path) -> Result<String, SourceError> {
    let io_err = |path: &Path, e: &dyn std::fmt::Display| SourceError::Io {
        path: path.to_path_buf(),
        error: e.to_string(),
    };

    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            !e.file_name()
                .to_str()
                .is_some_and(|n| HASH_SKIP.contains(&n))
        });
    for entry in walker {
        let entry = entry.map_err(|e| io_err(root, &e))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| io_err(entry.path(), &e))?
            .to_string_lossy()
            .replace('\\', "/");
        entries.push((relative, entry.into_path()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (relative, path) in entries {
        let content = if path.is_symlink() {
            std::fs::read_link(&path)
                .map_err(|e| io_err(&path, &e))?
                .to_string_lossy()
                .into_owned()
                .into_bytes()
        } else {
            std::fs::read(&path).map_err(|e| io_err(&path, &e))?
        };
        hasher.update(relative.as_bytes());
        hasher.update([0]);
        hasher.update((content.len() as u64).to_le_bytes());
        hasher.update(&content);
    }
    Ok(hex::encode(hasher.finalize()))
}
