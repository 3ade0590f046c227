//! A handle over a single filesystem path.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Errors raised by virtual file operations.
#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    /// An I/O error occurred while reading a file or directory.
    #[error("vfs I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// A file or directory reachable through the engine's search roots.
///
/// The handle itself carries no I/O state; every operation consults the
/// filesystem, so staleness checks always observe current reality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VfsFile {
    path: PathBuf,
}

impl VfsFile {
    /// Opens a handle over the given path. The path does not need to exist.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the underlying path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the final component of the path, or an empty string for
    /// paths without one.
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
    }

    /// Returns `true` if the path exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Returns `true` if the path exists and is a directory.
    pub fn is_directory(&self) -> bool {
        self.path.is_dir()
    }

    /// Returns the last modification time, or `None` if the path does not
    /// exist or the filesystem cannot report it.
    pub fn last_modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path).ok()?.modified().ok()
    }

    /// Reads the full content as bytes.
    pub fn read(&self) -> Result<Vec<u8>, VfsError> {
        std::fs::read(&self.path).map_err(|e| VfsError::Io {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Reads the full content as a UTF-8 string.
    pub fn read_to_string(&self) -> Result<String, VfsError> {
        std::fs::read_to_string(&self.path).map_err(|e| VfsError::Io {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Returns a handle over a child of this path.
    pub fn child(&self, name: impl AsRef<Path>) -> VfsFile {
        VfsFile {
            path: self.path.join(name),
        }
    }

    /// Lists the direct children of a directory, sorted by name for
    /// deterministic traversal. Returns an empty list if the path does
    /// not exist or is not a directory.
    pub fn list(&self) -> Vec<VfsFile> {
        let Ok(entries) = std::fs::read_dir(&self.path) else {
            return Vec::new();
        };
        let mut children: Vec<VfsFile> = entries
            .flatten()
            .map(|entry| VfsFile { path: entry.path() })
            .collect();
        children.sort_by(|a, b| a.path.cmp(&b.path));
        children
    }

    /// Returns this file's path relative to `root`, if it lives under it.
    pub fn relative_to(&self, root: &VfsFile) -> Option<&Path> {
        self.path.strip_prefix(&root.path).ok()
    }
}
