//! Configuration types for the reload engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level engine configuration, the contents of `kiln.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine behavior settings.
    #[serde(default)]
    pub engine: EngineSection,

    /// Search root and directory layout settings.
    #[serde(default)]
    pub paths: PathsConfig,
}

/// The `[engine]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    /// Run mode. Development mode tracks source freshness; production
    /// mode trusts staged artifacts unconditionally.
    #[serde(default)]
    pub mode: Mode,

    /// When `true`, resolution prefers staged precompiled artifacts and
    /// a missing artifact is a startup failure rather than a compile
    /// trigger.
    #[serde(default)]
    pub use_precompiled: bool,

    /// File extension of application source units.
    #[serde(default = "default_source_extension")]
    pub source_extension: String,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            mode: Mode::Dev,
            use_precompiled: false,
            source_extension: default_source_extension(),
        }
    }
}

/// The `[paths]` section. All paths are relative to the application root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Ordered source roots: application first, then extensions.
    #[serde(default = "default_source_roots")]
    pub source_roots: Vec<PathBuf>,

    /// Base framework source root, searched after every source root.
    #[serde(default)]
    pub framework_root: Option<PathBuf>,

    /// Ordered template roots.
    #[serde(default = "default_template_roots")]
    pub template_roots: Vec<PathBuf>,

    /// Directory holding the persistent bytecode cache.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Directory tree holding staged precompiled artifacts.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_roots: default_source_roots(),
            framework_root: None,
            template_roots: default_template_roots(),
            cache_dir: default_cache_dir(),
            staging_dir: default_staging_dir(),
        }
    }
}

/// Engine run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Development: sources are watched and recompiled on change.
    #[default]
    Dev,
    /// Production: staged artifacts are loaded once and trusted.
    Prod,
}

impl Mode {
    /// Returns `true` in development mode.
    pub fn is_dev(&self) -> bool {
        matches!(self, Mode::Dev)
    }
}

fn default_source_extension() -> String {
    "unit".to_string()
}

fn default_source_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("app")]
}

fn default_template_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("app/views")]
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".kiln-cache")
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("precompiled")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.engine.mode, Mode::Dev);
        assert!(!config.engine.use_precompiled);
        assert_eq!(config.engine.source_extension, "unit");
        assert_eq!(config.paths.source_roots, vec![PathBuf::from("app")]);
        assert_eq!(config.paths.cache_dir, PathBuf::from(".kiln-cache"));
        assert_eq!(config.paths.staging_dir, PathBuf::from("precompiled"));
        assert!(config.paths.framework_root.is_none());
    }

    #[test]
    fn mode_is_dev() {
        assert!(Mode::Dev.is_dev());
        assert!(!Mode::Prod.is_dev());
    }
}
