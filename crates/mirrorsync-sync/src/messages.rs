//! Sync protocol message types.
//!
//! These messages are exchanged between peers to discover each other's
//! branches. Requests start with `Rq`, responses with `Rs`.

use std::fmt;
use std::io::Cursor;

use serde::{Deserialize, Serialize};

use mirrorsync_core::{ObjectId, UserId, VersionVector};

use crate::error::{Result, SyncError};

/// Message size limits.
pub mod limits {
    /// Max user ids in `RsBranchList`.
    pub const MAX_BRANCH_LIST: usize = 10_000;
    /// Default upper bound on a single frame's payload.
    pub const DEFAULT_MAX_FRAME_LEN: usize = 8 * 1024 * 1024;
}

/// Sync protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Ask which branches the peer knows about.
    RqBranchList,

    /// Replicas the responder has a branch for. Order carries no meaning.
    RsBranchList(Vec<UserId>),

    /// Ask for the current state of one branch.
    RqBranch {
        /// The replica whose branch is requested.
        branch_id: UserId,
    },

    /// Current state of the requested branch.
    RsBranch {
        /// The branch's version vector.
        version_vector: VersionVector,
        /// The branch's root object.
        root_id: ObjectId,
    },
}

impl Message {
    /// Variant name, for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Message::RqBranchList => "RqBranchList",
            Message::RsBranchList(_) => "RsBranchList",
            Message::RqBranch { .. } => "RqBranch",
            Message::RsBranch { .. } => "RsBranch",
        }
    }

    /// Check if this message respects size limits.
    pub fn validate_limits(&self) -> std::result::Result<(), &'static str> {
        match self {
            Message::RsBranchList(ids) if ids.len() > limits::MAX_BRANCH_LIST => {
                Err("too many branch ids")
            }
            _ => Ok(()),
        }
    }

    /// Serialize to a frame payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| SyncError::Encode(e.to_string()))?;
        Ok(buf)
    }

    /// Parse a frame payload.
    ///
    /// The payload must hold exactly one message; trailing bytes are an error.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let message: Message =
            ciborium::from_reader(&mut cursor).map_err(|e| SyncError::Decode(e.to_string()))?;
        if cursor.position() as usize != bytes.len() {
            return Err(SyncError::Decode("trailing bytes after message".into()));
        }
        message
            .validate_limits()
            .map_err(|e| SyncError::InvalidMessage(e.into()))?;
        Ok(message)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::RqBranchList => write!(f, "RqBranchList"),
            Message::RsBranchList(ids) => {
                write!(f, "RsBranchList[")?;
                for (i, id) in ids.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", id)?;
                }
                write!(f, "]")
            }
            Message::RqBranch { branch_id } => write!(f, "RqBranch {{ {} }}", branch_id),
            Message::RsBranch {
                version_vector,
                root_id,
            } => write!(f, "RsBranch {{ {:?}, {} }}", version_vector, root_id),
        }
    }
}
