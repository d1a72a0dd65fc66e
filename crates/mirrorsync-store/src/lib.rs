//! # mirrorsync store
//!
//! Durable, filesystem-backed storage for mirrorsync: the content-addressed
//! object store and the per-replica branch files that point into it.
//!
//! ## Overview
//!
//! - [`io`] - store, load, and remove objects by content address
//! - [`Branch`] - a replica's root id plus version vector, persisted atomically
//!
//! Both take their directories explicitly, so tests can point them at a
//! temporary directory.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use mirrorsync_core::UserId;
//! use mirrorsync_store::Branch;
//!
//! fn example() -> mirrorsync_store::Result<()> {
//!     let mut branch = Branch::load_or_create("repo/branches", "repo/objects", UserId::random())?;
//!     if branch.maybe_store(Path::new("docs/readme"), &b"hello"[..])? {
//!         println!("new root {}", branch.root_object_id());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Content addressing**: object ids are computed, never supplied
//! - **Atomic replacement**: every file is written to a temporary file and renamed
//! - **Integrity**: loads re-hash the stored bytes and reject mismatches
//! - **Stale writes are not errors**: `maybe_store` reports them as `false`

pub mod branch;
pub mod error;
mod fs;
pub mod io;

pub use branch::{list_branches, Branch, BRANCH_FORMAT};
pub use error::{Result, StoreError};
