//! Helpers for fully-qualified compilation unit names.
//!
//! Unit names are dotted paths derived from source file locations
//! (`controllers.Home`). A `$` separator marks a nested unit that shares
//! its enclosing unit's source file (`controllers.Home$Form`).

use std::path::{Path, PathBuf};

/// Separator between an enclosing unit name and a nested unit name.
pub const NESTED_SEPARATOR: char = '$';

/// Returns `true` if `name` denotes a nested unit.
pub fn is_nested(name: &str) -> bool {
    name.contains(NESTED_SEPARATOR)
}

/// Returns the enclosing unit name for a nested unit.
///
/// For a top-level unit this is the name itself.
pub fn enclosing(name: &str) -> &str {
    match name.find(NESTED_SEPARATOR) {
        Some(pos) => &name[..pos],
        None => name,
    }
}

/// Derives a qualified unit name from a path relative to a search root.
///
/// The file extension is stripped and path separators become dots, so
/// `controllers/Home.unit` maps to `controllers.Home`. Returns `None` if
/// the path has no stem or contains non-UTF-8 components.
pub fn from_relative_path(relative: &Path) -> Option<String> {
    let mut segments = Vec::new();
    let parent = relative.parent()?;
    for component in parent.components() {
        segments.push(component.as_os_str().to_str()?.to_string());
    }
    segments.push(relative.file_stem()?.to_str()?.to_string());
    Some(segments.join("."))
}

/// Converts a qualified unit name to a relative file path with the given
/// extension.
///
/// The nested part of the name is dropped first: `controllers.Home$Form`
/// with extension `unit` maps to `controllers/Home.unit`.
pub fn to_relative_path(name: &str, extension: &str) -> PathBuf {
    let base = enclosing(name);
    let mut path: PathBuf = base.split('.').collect();
    path.set_extension(extension);
    path
}

/// Converts a qualified unit name, nested part included, to a relative
/// artifact path with the given extension.
///
/// Used for staged artifacts, which exist per unit rather than per source
/// file: `controllers.Home$Form` maps to `controllers/Home$Form.blob`.
pub fn to_artifact_path(name: &str, extension: &str) -> PathBuf {
    let mut path: PathBuf = name.split('.').collect();
    path.set_extension(extension);
    path
}
