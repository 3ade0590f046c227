//! Compiled render-template caching.
//!
//! The same load pattern as executable units, applied to templates:
//! precompiled fast path, then compile-from-source, with staleness
//! governed purely by path-based timestamp comparison. Templates do not
//! participate in binary linkage, so there is no signature or hot-swap
//! step; a changed template is simply swapped wholesale, and any change
//! to executable code invalidates the whole template cache.

#![warn(missing_docs)]

pub mod artifact;
pub mod cache;
pub mod compiler;
pub mod error;

pub use artifact::RenderArtifact;
pub use cache::TemplateArtifactCache;
pub use compiler::{RenderTemplate, TemplateCompiler};
pub use error::TemplateError;
