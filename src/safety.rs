use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directories inside the workspace that must never be patched.
const FORBIDDEN_DIRS: &[&str] = &[".git", "node_modules", "dist"];

/// Workspace safety checks to prevent editing files outside the target workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    /// Absolute path to workspace root
    workspace_root: PathBuf,
    /// Canonical paths to forbidden directories
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside workspace: {path} (workspace: {workspace})")]
    OutsideWorkspace { path: PathBuf, workspace: PathBuf },

    #[error("Path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("Failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl WorkspaceGuard {
    /// Create a new workspace guard with the given root.
    ///
    /// The workspace root will be canonicalized to handle symlinks correctly.
    pub fn new(workspace_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let workspace_root = workspace_root.as_ref().canonicalize()?;

        let mut forbidden_paths = Vec::new();
        for dir in FORBIDDEN_DIRS {
            if let Ok(canonical) = workspace_root.join(dir).canonicalize() {
                forbidden_paths.push(canonical);
            }
        }

        Ok(Self {
            workspace_root,
            forbidden_paths,
        })
    }

    /// Check if a path is safe to edit.
    ///
    /// Returns the canonicalized absolute path if safe.
    ///
    /// Note: This performs canonicalization at validation time. For maximum
    /// TOCTOU safety, callers should re-validate immediately before write
    /// operations in adversarial environments.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();

        // Resolve relative paths against workspace root
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        };

        // Canonicalize to resolve symlinks and .. components
        let canonical = absolute.canonicalize()?;

        self.check_canonical(&canonical)?;

        Ok(canonical)
    }

    /// Re-validate a previously-validated canonical path.
    ///
    /// Call this immediately before write to close the TOCTOU window:
    /// the path is re-canonicalized and re-checked against workspace
    /// and forbidden boundaries.
    pub fn revalidate(&self, path: &Path) -> Result<PathBuf, SafetyError> {
        let canonical = path.canonicalize()?;
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.workspace_root) {
            return Err(SafetyError::OutsideWorkspace {
                path: canonical.to_path_buf(),
                workspace: self.workspace_root.clone(),
            });
        }

        for forbidden in &self.forbidden_paths {
            if canonical.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(())
    }

    /// Get the workspace root.
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }
}
