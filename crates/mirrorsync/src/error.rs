//! Error types for repository operations.

use mirrorsync_core::{ErrorKind, UserId};
use mirrorsync_store::StoreError;
use mirrorsync_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// No branch is known for this replica.
    #[error("unknown branch: {0}")]
    UnknownBranch(UserId),
}

impl RepoError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepoError::Store(e) => e.kind(),
            RepoError::Sync(e) => e.kind(),
            RepoError::UnknownBranch(_) => ErrorKind::NotFound,
        }
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepoError>;
