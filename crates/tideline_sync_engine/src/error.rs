//! Error types for the sync engine.

use thiserror::Error;
use tideline_protocol::ProtocolError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Payload could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Server answered with an error object.
    #[error("server error {code}: {items}")]
    Server {
        /// Error code.
        code: String,
        /// Offending items.
        items: String,
    },

    /// Server answered with an unexpected constructor.
    #[error("unexpected response tag {0:#x}")]
    UnexpectedResponse(i64),

    /// Local storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A record the operation depends on is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Persisted state could not be interpreted.
    #[error("corrupt state: {0}")]
    CorruptState(String),

    /// Request timed out.
    #[error("operation timed out")]
    Timeout,

    /// Not connected.
    #[error("not connected to server")]
    NotConnected,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Creates a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout | SyncError::NotConnected => true,
            _ => false,
        }
    }
}
