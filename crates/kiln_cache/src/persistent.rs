//! Content-addressed on-disk cache of enhanced artifacts.
//!
//! Entries are keyed by (unit name, source fingerprint), so a changed
//! source always selects a new entry and stale entries are orphaned, never
//! overwritten. Each entry carries a validated binary header; corruption
//! of any kind reads back as a miss.

use std::path::{Path, PathBuf};

use kiln_common::Fingerprint;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Magic bytes identifying a Kiln cache entry.
const ENTRY_MAGIC: [u8; 4] = *b"KILN";

/// Current entry format version. Increment on breaking changes to the
/// header or payload layout.
const ENTRY_FORMAT_VERSION: u32 = 1;

/// Subdirectory of the cache root holding unit artifacts.
const UNITS_SUBDIR: &str = "units";

/// File extension for cache entries.
const ENTRY_EXT: &str = "blob";

/// Header prepended to every cache entry for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryHeader {
    /// Magic bytes: must be `b"KILN"`.
    magic: [u8; 4],

    /// Entry format version.
    format_version: u32,

    /// Fingerprint of the payload, for corruption detection.
    checksum: Fingerprint,
}

/// On-disk cache mapping (unit name, source fingerprint) to enhanced
/// artifact bytes, surviving process restarts.
///
/// Entries are immutable once written. Correctness never depends on a
/// hit; every read path degrades to a recompile on a miss.
pub struct PersistentArtifactCache {
    cache_dir: PathBuf,
}

impl PersistentArtifactCache {
    /// Creates a cache rooted at the given directory. The directory is
    /// created lazily on first write.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    /// Returns the entry path for a unit name and source fingerprint.
    pub fn entry_path(&self, name: &str, fingerprint: &Fingerprint) -> PathBuf {
        self.cache_dir
            .join(UNITS_SUBDIR)
            .join(format!("{name}-{fingerprint}.{ENTRY_EXT}"))
    }

    /// Looks up the enhanced bytes for (name, fingerprint).
    ///
    /// Returns `None` on a missing entry, a truncated or corrupt header,
    /// a format version mismatch, or a checksum failure.
    pub fn get(&self, name: &str, fingerprint: &Fingerprint) -> Option<Vec<u8>> {
        let raw = std::fs::read(self.entry_path(name, fingerprint)).ok()?;
        if raw.len() < 4 {
            return None;
        }

        let header_len = u32::from_le_bytes(raw[..4].try_into().ok()?) as usize;
        if raw.len() < 4 + header_len {
            return None;
        }

        let header: EntryHeader =
            bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
                .ok()?
                .0;
        if header.magic != ENTRY_MAGIC || header.format_version != ENTRY_FORMAT_VERSION {
            return None;
        }

        let payload = &raw[4 + header_len..];
        if Fingerprint::of(payload) != header.checksum {
            return None;
        }

        Some(payload.to_vec())
    }

    /// Stores enhanced bytes under (name, fingerprint).
    ///
    /// Insert-if-absent: an existing entry is left untouched, since the
    /// key is content-derived and the entry immutable. New entries are
    /// written to a temporary file and renamed into place so concurrent
    /// readers never observe a partial entry.
    pub fn put(
        &self,
        name: &str,
        fingerprint: &Fingerprint,
        bytes: &[u8],
    ) -> Result<(), CacheError> {
        let path = self.entry_path(name, fingerprint);
        if path.exists() {
            return Ok(());
        }

        let dir = self.cache_dir.join(UNITS_SUBDIR);
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::Io {
            path: dir.clone(),
            source: e,
        })?;

        let header = EntryHeader {
            magic: ENTRY_MAGIC,
            format_version: ENTRY_FORMAT_VERSION,
            checksum: Fingerprint::of(bytes),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        // Layout: 4-byte header length (little-endian) + header + payload.
        let mut output = Vec::with_capacity(4 + header_bytes.len() + bytes.len());
        output.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(bytes);

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &output).map_err(|e| CacheError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| CacheError::Io { path, source: e })
    }
}
