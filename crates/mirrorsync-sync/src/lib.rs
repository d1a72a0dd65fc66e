//! # mirrorsync sync
//!
//! Branch discovery between two replicas over any async byte stream.
//!
//! ## Overview
//!
//! A replica advertises which branches it holds and what state each is in.
//! The peer compares every advertised version vector against its own and
//! decides, per branch, whether it is up to date, behind, ahead, or has
//! diverged. Pulling objects is left to the caller.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mirrorsync_sync::{memory, BranchIndex, SyncConfig, SyncSession};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn example(local: &dyn BranchIndex) -> mirrorsync_sync::Result<()> {
//!     let config = SyncConfig::default();
//!     let (conn, _peer) = memory::pair(&config);
//!
//!     let mut session = SyncSession::new(conn, config, CancellationToken::new());
//!     let report = session.discover(local).await?;
//!     println!("{} branches to pull", report.ahead.len());
//!     session.finish().await
//! }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Requester                           Responder
//!   |-------- RqBranchList ----------->|
//!   |<------- RsBranchList ------------|
//!   |-------- RqBranch { id } -------->|
//!   |<------- RsBranch { vv, root } ---|
//!   |           ... per branch ...     |
//! ```

pub mod error;
pub mod messages;
pub mod protocol;
pub mod transport;

pub use error::{Result, SyncError};
pub use messages::{limits, Message};
pub use protocol::{BranchIndex, BranchState, Responder, SyncConfig, SyncReport, SyncSession};
pub use transport::{memory, Connection, MessageCodec};
pub use tokio_util::sync::CancellationToken;
