//! Error types for mirrorsync core.

use thiserror::Error;

/// Coarse classification shared by every error type in the workspace.
///
/// Callers that only need to decide "retry, give up or ignore" match on this
/// instead of the concrete error enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An object or branch file does not exist.
    NotFound,
    /// Bytes did not decode, had the wrong tag, or failed an integrity check.
    Corrupt,
    /// Durable storage or the transport failed.
    Io,
    /// A cancellation token fired.
    Cancelled,
    /// A proposed branch state does not causally dominate the current one.
    Conflict,
}

/// Errors raised while encoding or decoding objects.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("malformed object: {0}")]
    MalformedObject(String),

    #[error("object kind mismatch: expected {expected}, found tag {found}")]
    TypeMismatch { expected: &'static str, found: u8 },

    #[error("unknown object tag: {0}")]
    UnknownTag(u8),
}

impl CoreError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        // Every core failure is a data problem; nothing here touches I/O.
        ErrorKind::Corrupt
    }
}
