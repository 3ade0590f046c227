//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur while writing cache entries.
///
/// Reads are fail-safe and never surface an error: a corrupt or missing
/// entry is simply a cache miss.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while writing a cache file.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An entry header could not be serialized.
    #[error("cache serialization error: {reason}")]
    Serialization {
        /// Description of the failure.
        reason: String,
    },
}
