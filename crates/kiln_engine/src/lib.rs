//! Incremental compilation and live code reload.
//!
//! The engine resolves unit names to installed artifacts through a
//! multi-tier load ladder (in-process image, staged precompiled
//! artifact, persistent cache, compile from source) and runs a
//! change-detection cycle that recompiles what changed, hot-swaps
//! signature-preserving edits in place, and escalates everything else
//! to an explicit reload-required signal.

#![warn(missing_docs)]

mod detector;
pub mod engine;
pub mod error;
pub mod loaded;
pub mod scan;
pub mod traits;

pub use engine::{Collaborators, Engine};
pub use error::{CycleOutcome, EngineError, ReloadReason};
pub use loaded::LoadedUnit;
pub use traits::{
    CompileBatch, CompileDiagnostic, CompileRequest, CompiledUnit, DenyHotSwap, DependencyTracker,
    Enhanced, Enhancer, HotSwap, HotSwapError, NoDependencies, NoopValueCache, Redefinition,
    UnitCompiler, ValueCache,
};
