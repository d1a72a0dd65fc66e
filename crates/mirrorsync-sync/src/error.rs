//! Error types for the sync module.

use mirrorsync_core::ErrorKind;
use thiserror::Error;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// Peer closed the stream between frames.
    #[error("connection closed by peer")]
    Closed,

    /// Peer closed the stream in the middle of a frame.
    #[error("connection closed mid-frame")]
    Truncated,

    /// A frame did not decode to a message.
    #[error("decode error: {0}")]
    Decode(String),

    /// A message could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// Message validation failed.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Peer sent a well-formed message of the wrong shape.
    #[error("unexpected message: expected {expected}, got {got}")]
    UnexpectedMessage {
        expected: &'static str,
        got: &'static str,
    },

    /// Timeout waiting for peer.
    #[error("timeout: {0}")]
    Timeout(String),

    /// An earlier cancelled send left a partial frame on the stream.
    #[error("connection unusable after interrupted send")]
    Poisoned,

    /// Transport-level error.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Cancelled => ErrorKind::Cancelled,
            SyncError::Closed
            | SyncError::Timeout(_)
            | SyncError::Poisoned
            | SyncError::Io(_) => ErrorKind::Io,
            SyncError::Truncated
            | SyncError::Decode(_)
            | SyncError::Encode(_)
            | SyncError::InvalidMessage(_)
            | SyncError::UnexpectedMessage { .. } => ErrorKind::Corrupt,
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
