//! Contracts of the engine's external collaborators.
//!
//! The compiler, the post-compile enhancer, the dependency tracker, the
//! hot-swap primitive, and the value cache are all external to the
//! engine; only their interface boundary is modeled here. Each trait
//! ships a portable baseline implementation where one makes sense.

use kiln_common::{SigChecksum, UnitMeta};
use kiln_vfs::VfsFile;
use std::path::PathBuf;

/// One unit handed to the compiler.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    /// Qualified unit name.
    pub name: String,

    /// The source file the text was read from.
    pub source: VfsFile,

    /// Source text at request time.
    pub text: String,
}

/// One successfully compiled unit.
///
/// A compiler may emit units beyond those requested, e.g. nested units
/// produced as byproducts of their enclosing unit; those carry the
/// `derivable` flag.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    /// Qualified unit name.
    pub name: String,

    /// Raw compiled output, before enhancement.
    pub bytes: Vec<u8>,

    /// Member metadata derived during compilation.
    pub meta: UnitMeta,

    /// `true` if this unit was produced as a byproduct of another
    /// requested unit and can always be re-derived without a dedicated
    /// request.
    pub derivable: bool,
}

/// A per-unit compile failure with its source location.
#[derive(Debug, Clone)]
pub struct CompileDiagnostic {
    /// The failing unit name.
    pub name: String,

    /// Source file of the failure.
    pub path: PathBuf,

    /// Line of the failure, when known.
    pub line: Option<u32>,

    /// Compiler message.
    pub message: String,
}

/// Result of one batched compiler invocation.
#[derive(Debug, Clone, Default)]
pub struct CompileBatch {
    /// Successfully compiled units, requested and byproducts alike.
    pub units: Vec<CompiledUnit>,

    /// Per-unit failures. A failed unit never appears in `units`.
    pub failures: Vec<CompileDiagnostic>,
}

/// The external compiler. Requests are batched for efficiency; the
/// compiler reports per-unit success and failure independently.
pub trait UnitCompiler: Send + Sync {
    /// Compiles a batch of units.
    fn compile(&self, requests: &[CompileRequest]) -> CompileBatch;
}

/// Output of the post-compile enhancement step.
#[derive(Debug, Clone)]
pub struct Enhanced {
    /// The transformed body, ready to install.
    pub body: Vec<u8>,

    /// Signature checksum of the unit's externally visible shape after
    /// enhancement.
    pub sig_checksum: SigChecksum,
}

/// Post-processes compiled output before install.
///
/// Enhancement is opaque to the engine; it may inject instrumentation or
/// validate calling conventions. The signature checksum it reports must
/// be a deterministic function of the unit's externally visible shape,
/// so that two builds of an unchanged shape compare equal.
pub trait Enhancer: Send + Sync {
    /// Enhances one compiled unit.
    fn enhance(&self, name: &str, body: &[u8], meta: &UnitMeta) -> Enhanced;

    /// Best-effort re-derivation of a signature checksum from a member
    /// table alone, used when installing an artifact that skipped the
    /// enhancement step. `None` disables hot-swap classification for
    /// that unit, which degrades to reload-required, never to a wrong
    /// swap.
    fn derive_signature(&self, meta: &UnitMeta) -> Option<SigChecksum> {
        let _ = meta;
        None
    }
}

/// Expands a set of changed units to everything affected by the change.
pub trait DependencyTracker: Send + Sync {
    /// Returns additional units affected by the given changed set, e.g.
    /// subclasses or callers bound by signature. Names already in the
    /// changed set may be repeated; the engine deduplicates.
    fn on_changed(&self, changed: &[String]) -> Vec<String>;
}

/// Dependency tracker that reports no additional units.
#[derive(Debug, Default)]
pub struct NoDependencies;

impl DependencyTracker for NoDependencies {
    fn on_changed(&self, _changed: &[String]) -> Vec<String> {
        Vec::new()
    }
}

/// One queued in-place redefinition.
#[derive(Debug, Clone)]
pub struct Redefinition {
    /// The installed unit to replace.
    pub name: String,

    /// The new enhanced artifact envelope bytes.
    pub bytes: Vec<u8>,
}

/// The platform rejected an in-place redefinition.
#[derive(Debug, thiserror::Error)]
#[error("hot swap rejected: {reason}")]
pub struct HotSwapError {
    /// The platform's rejection message.
    pub reason: String,
}

/// Platform primitive replacing the code of already-loaded units.
///
/// The contract is redefine-or-fail: a failure means nothing was
/// applied, and the engine escalates to reload-required.
pub trait HotSwap: Send + Sync {
    /// Atomically redefines the given units in the running process.
    fn redefine(&self, redefinitions: &[Redefinition]) -> Result<(), HotSwapError>;
}

/// Portable hot-swap baseline for runtimes without live code
/// replacement: every attempt fails, so every change degrades to
/// reload-required. A legitimate, fully-correct subset of the design.
#[derive(Debug, Default)]
pub struct DenyHotSwap;

impl HotSwap for DenyHotSwap {
    fn redefine(&self, _redefinitions: &[Redefinition]) -> Result<(), HotSwapError> {
        Err(HotSwapError {
            reason: "live code replacement is not available on this runtime".to_string(),
        })
    }
}

/// General-purpose value cache that may hold instances built from old
/// code shapes. Cleared before any in-place redefinition is attempted.
pub trait ValueCache: Send + Sync {
    /// Drops every cached value.
    fn clear(&self);
}

/// Value cache baseline for applications that cache nothing.
#[derive(Debug, Default)]
pub struct NoopValueCache;

impl ValueCache for NoopValueCache {
    fn clear(&self) {}
}
