//! The cached record of one loaded template.

use crate::compiler::RenderTemplate;
use kiln_vfs::VfsFile;
use std::sync::Arc;
use std::time::SystemTime;

/// A loaded render template and the state needed to detect staleness.
#[derive(Clone)]
pub struct RenderArtifact {
    /// Template path relative to the template roots, the cache key.
    pub path: String,

    /// Unique numeric token assigned to this path, usable as part of a
    /// generated renderer name.
    pub token: u64,

    /// Modification time of whatever the renderer was built from, source
    /// or precompiled file, at load time.
    pub timestamp: Option<SystemTime>,

    /// `true` if the renderer was loaded from a precompiled artifact.
    pub precompiled: bool,

    /// The source file, when one exists.
    pub source: Option<VfsFile>,

    /// The executable renderer.
    pub renderer: Arc<dyn RenderTemplate>,
}

impl RenderArtifact {
    /// Returns `true` if the backing source has been modified since the
    /// renderer was built.
    pub fn is_stale(&self) -> bool {
        let Some(source) = &self.source else {
            return false;
        };
        match (source.last_modified(), self.timestamp) {
            (Some(modified), Some(built)) => modified > built,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

impl std::fmt::Debug for RenderArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderArtifact")
            .field("path", &self.path)
            .field("token", &self.token)
            .field("precompiled", &self.precompiled)
            .finish()
    }
}
