//! Virtual file access over ordered search roots.
//!
//! This crate provides [`VfsFile`], a thin handle over a filesystem path
//! with the operations the reload engine needs (existence, modification
//! time, content, children), and [`SearchPath`], an ordered list of roots
//! resolved first-match-wins: application root first, then extension
//! roots, then the base framework root.

#![warn(missing_docs)]

pub mod file;
pub mod search;

pub use file::{VfsError, VfsFile};
pub use search::SearchPath;
