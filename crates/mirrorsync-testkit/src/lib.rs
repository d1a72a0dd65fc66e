//! # mirrorsync testkit
//!
//! Testing utilities for mirrorsync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Encoding vectors**: objects with their exact canonical bytes, for
//!   checking other encoders against this one
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: throwaway replica directories
//!
//! ## Encoding Vectors
//!
//! ```rust
//! use mirrorsync_testkit::vectors::all_vectors;
//!
//! for vector in all_vectors() {
//!     assert_eq!(vector.encode_hex(), vector.expected_hex);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use mirrorsync_testkit::generators::version_vector;
//!
//! proptest! {
//!     #[test]
//!     fn merge_is_commutative(a in version_vector(4), b in version_vector(4)) {
//!         prop_assert_eq!(a.merged(&b), b.merged(&a));
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use mirrorsync_testkit::fixtures::Replica;
//!
//! let replica = Replica::with_seed(1);
//! let id = replica.store_blob(b"hello");
//! assert!(replica.open_branch().root_object_id().is_zero());
//! # let _ = id;
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{replicas, Replica};
