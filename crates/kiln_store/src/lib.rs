//! In-memory registry of known compilation units.
//!
//! This crate provides [`CompilationUnit`], the record of one source-level
//! compilation target and its build state, and [`ArtifactStore`], the
//! ordered registry that exclusively owns unit lifetime. The store is pure
//! data plus lookup; all I/O policy lives in the engine crate.

#![warn(missing_docs)]

pub mod store;
pub mod unit;

pub use store::ArtifactStore;
pub use unit::CompilationUnit;
