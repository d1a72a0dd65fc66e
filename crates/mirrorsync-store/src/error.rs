//! Error types for the store module.

use mirrorsync_core::{CoreError, ErrorKind, ObjectId, UserId, VersionVector};
use thiserror::Error;

/// Errors that can occur during object store and branch operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No object is stored under this id.
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// A path does not resolve inside a branch's tree.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// Stored bytes do not hash to the id they are filed under.
    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: ObjectId, actual: ObjectId },

    /// Encoding, decoding or kind mismatch.
    #[error("object error: {0}")]
    Object(#[from] CoreError),

    /// A branch file exists but can't be used.
    #[error("invalid branch file {path}: {reason}")]
    InvalidBranchFile { path: String, reason: String },

    /// A caller-supplied path is not usable as a tree path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Proposed branch state does not strictly dominate the current state.
    #[error("conflict on branch {user_id}: local {local:?}, proposed {proposed:?}")]
    Conflict {
        user_id: UserId,
        local: VersionVector,
        proposed: VersionVector,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::ObjectNotFound(_) | StoreError::PathNotFound(_) => ErrorKind::NotFound,
            StoreError::IntegrityMismatch { .. }
            | StoreError::Object(_)
            | StoreError::InvalidBranchFile { .. }
            | StoreError::InvalidPath(_) => ErrorKind::Corrupt,
            StoreError::Conflict { .. } => ErrorKind::Conflict,
            StoreError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
