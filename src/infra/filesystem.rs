//! Filesystem operations
//!
//! Handles file and directory operations. Everything that other processes
//! may read concurrently (published artifacts, cached manifests, exported
//! source trees) is written to a temporary sibling first and moved into
//! place with a rename.

use std::io::Write;
use std::path::Path;

use tempfile::{NamedTempFile, TempDir};

use crate::error::FilesystemError;

/// Create a directory and all parent directories
pub fn create_dir_all(path: &Path) -> Result<(), FilesystemError> {
    std::fs::create_dir_all(path).map_err(|e| FilesystemError::CreateDir {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Read content from a file
pub fn read_file(path: &Path) -> Result<String, FilesystemError> {
    std::fs::read_to_string(path).map_err(|e| FilesystemError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Write `content` to `path` atomically
///
/// The content is staged in a temp file in the same directory, synced and
/// renamed over `path`, so readers see either the old or the new file.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), FilesystemError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    create_dir_all(parent)?;

    let write_err = |e: std::io::Error| FilesystemError::WriteFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    };

    let mut staged = NamedTempFile::new_in(parent).map_err(write_err)?;
    staged.write_all(content).map_err(write_err)?;
    staged.as_file().sync_all().map_err(write_err)?;
    staged
        .persist(path)
        .map_err(|e| FilesystemError::Publish {
            path: path.to_path_buf(),
            error: e.error.to_string(),
        })?;
    Ok(())
}

/// Create a staging directory next to `dest`
pub fn staging_dir_for(dest: &Path) -> Result<TempDir, FilesystemError> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    create_dir_all(parent)?;
    tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(parent)
        .map_err(|e| FilesystemError::CreateDir {
            path: parent.to_path_buf(),
            error: e.to_string(),
        })
}

/// Move a fully populated staging directory to `dest`
///
/// If `dest` appeared in the meantime (another process published the same
/// content), the staged copy is discarded.
pub fn publish_dir(staged: TempDir, dest: &Path) -> Result<(), FilesystemError> {
    let staged_path = staged.keep();
    match std::fs::rename(&staged_path, dest) {
        Ok(()) => Ok(()),
        Err(_) if dest.is_dir() => {
            let _ = std::fs::remove_dir_all(&staged_path);
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::remove_dir_all(&staged_path);
            Err(FilesystemError::Publish {
                path: dest.to_path_buf(),
                error: e.to_string(),
            })
        }
    }
}
