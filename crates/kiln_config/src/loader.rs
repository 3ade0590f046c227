//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::EngineConfig;
use std::path::Path;

/// Loads and validates a `kiln.toml` configuration from an application root.
///
/// A missing file yields the default configuration; development defaults
/// are usable without any configuration at all.
pub fn load_config(app_root: &Path) -> Result<EngineConfig, ConfigError> {
    let config_path = app_root.join("kiln.toml");
    if !config_path.exists() {
        return Ok(EngineConfig::default());
    }
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates field combinations the serde types cannot express.
fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.paths.source_roots.is_empty() {
        return Err(ConfigError::Invalid(
            "paths.source_roots must list at least one root".to_string(),
        ));
    }
    if config.engine.source_extension.is_empty() {
        return Err(ConfigError::Invalid(
            "engine.source_extension must not be empty".to_string(),
        ));
    }
    Ok(())
}
