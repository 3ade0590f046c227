//! Source-root scanning and the path-set digest.

use kiln_common::unit_name;
use kiln_vfs::{SearchPath, VfsFile};
use std::path::PathBuf;
use xxhash_rust::xxh3::xxh3_64;

/// One source file discovered under a search root.
#[derive(Debug, Clone)]
pub struct ScannedSource {
    /// Qualified unit name derived from the relative path.
    pub name: String,

    /// The source file.
    pub file: VfsFile,

    /// Path relative to the root it was found under.
    pub relative: PathBuf,
}

/// Walks every search root and returns the source units found, one per
/// name with earlier roots shadowing later ones, sorted by name.
pub fn scan_sources(roots: &SearchPath, extension: &str) -> Vec<ScannedSource> {
    let suffix = format!(".{extension}");
    let mut found: Vec<ScannedSource> = Vec::new();
    for root in roots.roots() {
        let mut in_root = Vec::new();
        walk(root, root, &suffix, &mut in_root);
        for scanned in in_root {
            if !found.iter().any(|s| s.name == scanned.name) {
                found.push(scanned);
            }
        }
    }
    found.sort_by(|a, b| a.name.cmp(&b.name));
    found
}

fn walk(root: &VfsFile, dir: &VfsFile, suffix: &str, found: &mut Vec<ScannedSource>) {
    for child in dir.list() {
        if child.name().starts_with('.') {
            continue;
        }
        if child.is_directory() {
            walk(root, &child, suffix, found);
        } else if child.name().ends_with(suffix) {
            let Some(relative) = child.relative_to(root) else {
                continue;
            };
            let Some(name) = unit_name::from_relative_path(relative) else {
                continue;
            };
            found.push(ScannedSource {
                name,
                relative: relative.to_path_buf(),
                file: child,
            });
        }
    }
}

/// Structural digest of the scanned path set.
///
/// Changes whenever a source file appears, disappears, or moves between
/// relative locations; deliberately insensitive to content edits. An
/// approximation: a swap that leaves the digest coincidentally equal
/// goes undetected, which is accepted.
pub fn path_digest(scanned: &[ScannedSource]) -> u64 {
    let mut paths: Vec<String> = scanned
        .iter()
        .map(|s| s.relative.to_string_lossy().into_owned())
        .collect();
    paths.sort();
    xxh3_64(paths.join("\n").as_bytes())
}
