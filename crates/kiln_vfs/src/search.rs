//! Ordered search roots with first-match resolution.

use crate::file::VfsFile;
use std::path::Path;

/// An ordered list of search roots.
///
/// Lookups walk the roots in order and return the first existing match,
/// so an application file shadows an extension file of the same relative
/// path, which in turn shadows the framework copy.
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    roots: Vec<VfsFile>,
}

impl SearchPath {
    /// Creates a search path from an ordered list of roots.
    pub fn new(roots: Vec<VfsFile>) -> Self {
        Self { roots }
    }

    /// Returns the roots in resolution order.
    pub fn roots(&self) -> &[VfsFile] {
        &self.roots
    }

    /// Returns the primary (first) root, if any.
    pub fn primary(&self) -> Option<&VfsFile> {
        self.roots.first()
    }

    /// Resolves a relative path against the roots, returning the first
    /// existing match.
    pub fn search(&self, relative: impl AsRef<Path>) -> Option<VfsFile> {
        let relative = relative.as_ref();
        self.roots
            .iter()
            .map(|root| root.child(relative))
            .find(VfsFile::exists)
    }

    /// Resolves a relative path against every root, existing or not, in
    /// resolution order. Used when the caller needs candidate locations
    /// rather than the winning one.
    pub fn candidates(&self, relative: impl AsRef<Path>) -> Vec<VfsFile> {
        let relative = relative.as_ref();
        self.roots.iter().map(|root| root.child(relative)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_root_wins() {
        let app = tempfile::tempdir().unwrap();
        let framework = tempfile::tempdir().unwrap();
        std::fs::write(app.path().join("Home.unit"), "app copy").unwrap();
        std::fs::write(framework.path().join("Home.unit"), "framework copy").unwrap();

        let sp = SearchPath::new(vec![
            VfsFile::open(app.path()),
            VfsFile::open(framework.path()),
        ]);
        let found = sp.search("Home.unit").unwrap();
        assert_eq!(found.read_to_string().unwrap(), "app copy");
    }

    #[test]
    fn falls_through_to_later_roots() {
        let app = tempfile::tempdir().unwrap();
        let framework = tempfile::tempdir().unwrap();
        std::fs::write(framework.path().join("Base.unit"), "framework copy").unwrap();

        let sp = SearchPath::new(vec![
            VfsFile::open(app.path()),
            VfsFile::open(framework.path()),
        ]);
        let found = sp.search("Base.unit").unwrap();
        assert_eq!(found.read_to_string().unwrap(), "framework copy");
    }

    #[test]
    fn missing_everywhere_is_none() {
        let app = tempfile::tempdir().unwrap();
        let sp = SearchPath::new(vec![VfsFile::open(app.path())]);
        assert!(sp.search("Missing.unit").is_none());
    }

    #[test]
    fn candidates_cover_all_roots() {
        let sp = SearchPath::new(vec![VfsFile::open("/app"), VfsFile::open("/framework")]);
        let candidates = sp.candidates("x.unit");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].path(), Path::new("/app/x.unit"));
    }
}
