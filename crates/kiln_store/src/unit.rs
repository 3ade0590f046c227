//! The record of a single compilation unit.

use kiln_common::{SigChecksum, UnitMeta};
use kiln_vfs::VfsFile;
use std::time::SystemTime;

/// One source-level compilation target and its build state.
///
/// A unit is created when first referenced by name, either discovered by
/// scanning the source roots or resolved from a staged artifact. Its
/// outputs are mutated by the orchestrator and the change detector; the
/// [`ArtifactStore`](crate::ArtifactStore) exclusively owns its lifetime.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    /// Fully-qualified unit name, the registry key.
    pub name: String,

    /// Backing source file. `None` for units that exist only as staged
    /// precompiled artifacts.
    pub source: Option<VfsFile>,

    /// Source modification time at the last successful build.
    pub timestamp: Option<SystemTime>,

    /// Staged precompiled artifact file, if one was discovered for this
    /// unit.
    pub staged: Option<VfsFile>,

    /// Raw compiler output, before enhancement.
    pub compiled: Option<Vec<u8>>,

    /// Enhanced artifact envelope bytes, the installable form.
    pub enhanced: Option<Vec<u8>>,

    /// `true` once the enhanced output has been installed into the
    /// running process. While set, the installed bytes match `enhanced`.
    pub defined: bool,

    /// Signature checksum of the last enhancement, used to decide
    /// hot-swap eligibility. Survives a refresh so the detector can
    /// compare across a recompile.
    pub sig_checksum: Option<SigChecksum>,

    /// `true` if the unit can be produced without invoking the compiler,
    /// e.g. a nested unit emitted as a byproduct of its enclosing unit.
    pub derivable: bool,

    /// Member metadata from the last build, if known.
    pub meta: Option<UnitMeta>,
}

impl CompilationUnit {
    /// Creates an empty unit record for the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            timestamp: None,
            staged: None,
            compiled: None,
            enhanced: None,
            defined: false,
            sig_checksum: None,
            derivable: false,
            meta: None,
        }
    }

    /// Creates a unit record backed by a source file.
    pub fn with_source(name: impl Into<String>, source: VfsFile) -> Self {
        let mut unit = Self::new(name);
        unit.source = Some(source);
        unit
    }

    /// Returns `true` if the unit is installed and can be returned
    /// without further work.
    pub fn is_definable(&self) -> bool {
        self.defined && self.enhanced.is_some()
    }

    /// Returns `true` if the unit's source is strictly newer than its
    /// last recorded build timestamp.
    pub fn is_stale(&self) -> bool {
        let Some(source) = &self.source else {
            return false;
        };
        let Some(modified) = source.last_modified() else {
            return false;
        };
        match self.timestamp {
            Some(built) => modified > built,
            None => true,
        }
    }

    /// Discards build outputs ahead of a recompile, recording the new
    /// source timestamp. The signature checksum is kept so the detector
    /// can classify the recompile outcome.
    pub fn refresh(&mut self, timestamp: Option<SystemTime>) {
        self.compiled = None;
        self.enhanced = None;
        self.defined = false;
        self.meta = None;
        self.timestamp = timestamp;
    }
}
