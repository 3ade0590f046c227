//! Artifact caching for the reload engine.
//!
//! Two fast paths around the compiler live here: the persistent
//! bytecode cache, a content-addressed on-disk store surviving process
//! restarts, and the precompiled artifact loader, which reads artifacts
//! staged by an offline build step. Both are optimizations only; a miss
//! is always satisfiable by recompiling from source.

#![warn(missing_docs)]

pub mod error;
pub mod persistent;
pub mod staged;

pub use error::CacheError;
pub use persistent::PersistentArtifactCache;
pub use staged::{PrecompiledArtifactLoader, StagedArtifact};
