//! Engine configuration loaded from `kiln.toml`.
//!
//! This crate defines the serde types for the engine configuration file
//! and a loader with validation. Paths in the configuration are relative
//! to the application root and resolved by the engine at startup.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str};
pub use types::{EngineConfig, Mode, PathsConfig};
