//! Content and signature digests.
//!
//! The engine hashes at two widths, both XXH3: a 128-bit fingerprint
//! over raw source bytes for cache keying, and a 64-bit checksum over a
//! unit's externally visible shape for hot-swap eligibility.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 128-bit fingerprint of a source unit's content.
///
/// Two sources with the same `Fingerprint` are assumed identical.
/// Fingerprints key the persistent artifact cache, so a changed source
/// always selects a different cache entry rather than overwriting an
/// existing one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(u128);

impl Fingerprint {
    /// Fingerprints a byte slice with XXH3-128.
    pub fn of(data: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_128(data))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:08x}..)", (self.0 >> 96) as u32)
    }
}

/// A checksum over a unit's externally visible shape.
///
/// Covers member names and argument types but not method bodies, so a
/// body-only edit keeps the checksum stable while a signature edit changes
/// it. An unchanged checksum after recompilation means the unit is safe to
/// redefine in place; a changed checksum forces a full reload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SigChecksum(u64);

impl SigChecksum {
    /// Computes a checksum over a canonical signature description.
    ///
    /// Callers are responsible for producing a deterministic byte encoding
    /// of the unit's members before hashing.
    pub fn of(canonical: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_64(canonical))
    }

    /// Returns the raw checksum value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SigChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for SigChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigChecksum({:016x})", self.0)
    }
}
