//! Shared foundational types used across the Kiln reload engine.
//!
//! This crate provides source fingerprints, signature checksums, qualified
//! unit-name helpers, unit member metadata, and the artifact envelope format
//! shared by the compile, cache, and install layers.

#![warn(missing_docs)]

pub mod digest;
pub mod envelope;
pub mod meta;
pub mod unit_name;

pub use digest::{Fingerprint, SigChecksum};
pub use envelope::{ArtifactEnvelope, EnvelopeError};
pub use meta::{FieldDecl, MethodDecl, UnitMeta};
