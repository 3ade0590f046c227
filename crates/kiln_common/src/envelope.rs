//! The artifact envelope shared by the compile, cache, and install layers.
//!
//! An enhanced artifact is a self-describing blob: the unit's member
//! metadata followed by the opaque compiled body. The envelope lets the
//! engine install a unit from the persistent cache or a staged artifact
//! without re-invoking the compiler to recover its member table.

use crate::meta::UnitMeta;
use serde::{Deserialize, Serialize};

/// An enhanced artifact ready to be installed into the running process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEnvelope {
    /// Member metadata for the unit.
    pub meta: UnitMeta,

    /// The compiled, post-processed body. Opaque to the engine; its format
    /// is owned by the compiler and enhancement collaborators.
    pub body: Vec<u8>,
}

/// Errors raised when encoding or decoding an artifact envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The blob could not be decoded as an envelope.
    #[error("malformed artifact envelope: {reason}")]
    Malformed {
        /// Description of the decode failure.
        reason: String,
    },
}

impl ArtifactEnvelope {
    /// Creates an envelope from a member table and compiled body.
    pub fn new(meta: UnitMeta, body: Vec<u8>) -> Self {
        Self { meta, body }
    }

    /// Encodes the envelope to bytes.
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard()).map_err(|e| {
            EnvelopeError::Malformed {
                reason: e.to_string(),
            }
        })
    }

    /// Decodes an envelope from bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(envelope, _)| envelope)
            .map_err(|e| EnvelopeError::Malformed {
                reason: e.to_string(),
            })
    }
}
