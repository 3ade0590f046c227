//! Cached member-handle lookup over explicit member tables.
//!
//! Loaded units are never inspected reflectively; the compiler emits a
//! member table per unit and lookups resolve against those tables through
//! a [`MemberSource`]. Resolutions, including "no such member", are cached
//! per owner until [`HandleCache::invalidate`] is called for that owner,
//! which must happen exactly once whenever a unit is redefined or newly
//! installed.

#![warn(missing_docs)]

pub mod cache;
pub mod handle;

pub use cache::{HandleCache, MemberSource};
pub use handle::{FieldHandle, MethodHandle};
