//! Artifact I/O: scoped read, atomic write-back.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to read artifact {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Artifact path has no parent directory: {0}")]
    NoParent(PathBuf),
}

/// Read the full artifact into memory.
pub fn load(path: &Path) -> Result<String, ArtifactError> {
    fs::read_to_string(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the artifact back atomically: tempfile + fsync + rename.
///
/// Either the full write succeeds or the original file is untouched. After a
/// successful rename the mtime is bumped so dev-server file watchers notice
/// the rewrite.
pub fn save(path: &Path, text: &str) -> Result<(), ArtifactError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| ArtifactError::NoParent(path.to_path_buf()))?;

    let write_err = |source: std::io::Error| ArtifactError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    temp.write_all(text.as_bytes()).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;
    temp.persist(path).map_err(|e| write_err(e.error))?;

    let now = filetime::FileTime::now();
    filetime::set_file_mtime(path, now).map_err(write_err)?;

    Ok(())
}
