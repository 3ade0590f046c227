//! Loader for artifacts staged by an offline build step.
//!
//! Staged artifacts live under a well-known directory tree, one file per
//! unit at a name-derived relative path. In source-aware (development)
//! mode each artifact is paired with its source file, wherever in the
//! search roots that source lives, so the caller can compare freshness.
//! In production mode artifacts are trusted unconditionally.

use kiln_common::unit_name;
use kiln_vfs::{SearchPath, VfsFile};

/// File extension of staged artifacts.
pub const STAGED_EXT: &str = "blob";

/// A staged precompiled artifact located for a unit.
#[derive(Debug, Clone)]
pub struct StagedArtifact {
    /// Qualified unit name.
    pub name: String,

    /// The staged artifact file.
    pub artifact: VfsFile,

    /// The paired source file, if the loader is source-aware and one
    /// exists in any search root.
    pub source: Option<VfsFile>,
}

impl StagedArtifact {
    /// Returns `true` if the paired source is strictly newer than the
    /// staged artifact. Without a paired source this is always `false`.
    pub fn source_is_newer(&self) -> bool {
        let Some(source) = &self.source else {
            return false;
        };
        match (source.last_modified(), self.artifact.last_modified()) {
            (Some(src), Some(art)) => src > art,
            _ => false,
        }
    }
}

/// Locates staged precompiled artifacts by unit name.
pub struct PrecompiledArtifactLoader {
    staging: VfsFile,
    sources: SearchPath,
    source_extension: String,
    source_aware: bool,
}

impl PrecompiledArtifactLoader {
    /// Creates a loader over the given staging directory.
    ///
    /// `sources` lists every root a paired source may live under,
    /// alternates included. With `source_aware` false (production), no
    /// source resolution is performed at all.
    pub fn new(
        staging: VfsFile,
        sources: SearchPath,
        source_extension: impl Into<String>,
        source_aware: bool,
    ) -> Self {
        Self {
            staging,
            sources,
            source_extension: source_extension.into(),
            source_aware,
        }
    }

    /// Locates the staged artifact for a unit name, if one exists.
    pub fn find(&self, name: &str) -> Option<StagedArtifact> {
        let artifact = self
            .staging
            .child(unit_name::to_artifact_path(name, STAGED_EXT));
        if !artifact.exists() {
            return None;
        }
        Some(StagedArtifact {
            name: name.to_string(),
            artifact,
            source: self.resolve_source(name),
        })
    }

    /// Walks the whole staging tree and returns every staged artifact,
    /// in path order. Used at production startup to register the full
    /// precompiled set in one pass.
    pub fn scan_all(&self) -> Vec<StagedArtifact> {
        let mut found = Vec::new();
        self.scan_dir(&self.staging, &mut found);
        found
    }

    fn scan_dir(&self, dir: &VfsFile, found: &mut Vec<StagedArtifact>) {
        for child in dir.list() {
            if child.is_directory() {
                self.scan_dir(&child, found);
            } else if child.name().ends_with(&format!(".{STAGED_EXT}"))
                && !child.name().starts_with('.')
            {
                let Some(relative) = child.relative_to(&self.staging) else {
                    continue;
                };
                let Some(name) = unit_name::from_relative_path(relative) else {
                    continue;
                };
                found.push(StagedArtifact {
                    source: self.resolve_source(&name),
                    name,
                    artifact: child,
                });
            }
        }
    }

    fn resolve_source(&self, name: &str) -> Option<VfsFile> {
        if !self.source_aware {
            return None;
        }
        self.sources
            .search(unit_name::to_relative_path(name, &self.source_extension))
    }
}
