//! Artifact publishing
//!
//! A built artifact is copied into a temp file inside the output directory,
//! synced, and renamed onto its published name. Dropping a
//! [`StagedArtifact`] without publishing removes the temp file, so the
//! published path only ever holds a complete artifact.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::BuildError;

/// A published build artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
    /// SHA-256 of the artifact bytes
    pub sha256: String,
    pub size: u64,
}

/// An artifact copied next to its destination but not yet visible there
#[derive(Debug)]
pub struct StagedArtifact {
    file: NamedTempFile,
    dest: PathBuf,
    name: String,
    sha256: String,
    size: u64,
}

impl StagedArtifact {
    /// Copy `built` into a temp file in the directory of `dest`
    pub fn stage(name: &str, built: &Path, dest: &Path) -> Result<Self, BuildError> {
        let publish_err = |e: &dyn std::fmt::Display| BuildError::ArtifactPublishFailure {
            path: dest.to_path_buf(),
            error: e.to_string(),
        };

        let out_dir = dest.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(out_dir).map_err(|e| publish_err(&e))?;

        let mut source = std::fs::File::open(built).map_err(|e| publish_err(&e))?;
        let mut file = tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .tempfile_in(out_dir)
            .map_err(|e| publish_err(&e))?;

        let mut hasher = Sha256::new();
        let mut size = 0u64;
        let mut buffer = [0u8; 64 * 1024];
        loop {
            let read = source.read(&mut buffer).map_err(|e| publish_err(&e))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            file.write_all(&buffer[..read]).map_err(|e| publish_err(&e))?;
            size += read as u64;
        }

        let permissions = source
            .metadata()
            .map_err(|e| publish_err(&e))?
            .permissions();
        file.as_file()
            .set_permissions(permissions)
            .map_err(|e| publish_err(&e))?;
        file.as_file().sync_all().map_err(|e| publish_err(&e))?;

        Ok(Self {
            file,
            dest: dest.to_path_buf(),
            name: name.to_string(),
            sha256: hex::encode(hasher.finalize()),
            size,
        })
    }

    /// Temp file holding the staged bytes
    pub fn staged_path(&self) -> &Path {
        self.file.path()
    }

    /// Rename the staged file onto its destination
    pub fn publish(self) -> Result<Artifact, BuildError> {
        self.file
            .persist(&self.dest)
            .map_err(|e| BuildError::ArtifactPublishFailure {
                path: self.dest.clone(),
                error: e.error.to_string(),
            })?;

        tracing::info!("Published {} ({} bytes)", self.dest.display(), self.size);
        Ok(Artifact {
            name: self.name,
            path: self.dest,
            sha256: self.sha256,
            size: self.size,
        })
    }
}
