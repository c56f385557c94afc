//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding, decoding or validating protocol data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Failed to encode a value to CBOR.
    #[error("encoding failed: {message}")]
    Encode {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode CBOR bytes.
    #[error("decoding failed: {message}")]
    Decode {
        /// Description of the decoding error.
        message: String,
    },

    /// A persisted timeline blob violates the bar invariants.
    #[error("corrupt timeline: {message}")]
    CorruptTimeline {
        /// Description of the violated invariant.
        message: String,
    },

    /// Type tag does not name a known constructor.
    #[error("unknown type tag: {0:#x}")]
    UnknownTag(i64),
}

impl ProtocolError {
    /// Creates an encoding error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Creates a decoding error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a corrupt timeline error.
    pub fn corrupt_timeline(message: impl Into<String>) -> Self {
        Self::CorruptTimeline {
            message: message.into(),
        }
    }

    /// Returns true if the error means persisted data cannot be trusted.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            ProtocolError::CorruptTimeline { .. } | ProtocolError::Decode { .. }
        )
    }
}
