//! # mirrorsync
//!
//! Replicated, content-addressed storage where each replica owns a branch
//! and peers compare branches by version vector.
//!
//! ## Overview
//!
//! - **Objects**: immutable blobs and trees, addressed by the BLAKE3 hash
//!   of their canonical encoding
//! - **Branches**: one per replica, a root object id plus a version vector,
//!   stored in its own file and replaced atomically
//! - **Discovery**: a four-message protocol over any byte stream telling a
//!   replica which remote branches are newer than its own copies
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mirrorsync::{Repository, RepositoryConfig};
//! use mirrorsync::core::UserId;
//! use mirrorsync::sync::memory;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn example() -> mirrorsync::Result<()> {
//!     let alice = Repository::open(RepositoryConfig::under("alice"), UserId::random())?;
//!     let bob = Repository::open(RepositoryConfig::under("bob"), UserId::random())?;
//!
//!     alice.write("docs/readme", &b"hello"[..]).await?;
//!
//!     let (a, b) = memory::pair(&alice.config().sync);
//!     let cancel = CancellationToken::new();
//!     let (served, report) = tokio::join!(alice.serve(a, &cancel), bob.sync_with(b, &cancel));
//!     served?;
//!     for (user, state) in report?.ahead {
//!         println!("{} has news at {}", user, state.root_id);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `mirrorsync::core` - ids, objects, version vectors, canonical encoding
//! - `mirrorsync::store` - object io and branch files
//! - `mirrorsync::sync` - framing and the discovery protocol

pub mod error;
pub mod repository;

// Re-export component crates
pub use mirrorsync_core as core;
pub use mirrorsync_store as store;
pub use mirrorsync_sync as sync;

pub use error::{RepoError, Result};
pub use repository::{Repository, RepositoryConfig};

// Re-export commonly used types
pub use mirrorsync_core::{
    Blob, Causality, ErrorKind, Node, Object, ObjectId, Tree, UserId, VersionVector,
};
pub use mirrorsync_sync::{BranchState, CancellationToken, SyncConfig, SyncReport};
