//! # mirrorsync core
//!
//! Pure primitives for mirrorsync: identifiers, version vectors, object kinds,
//! and canonicalization.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over the values the store persists and peers exchange.
//!
//! ## Key Types
//!
//! - [`ObjectId`] - Content-addressed identifier (Blake3 hash)
//! - [`UserId`] - Opaque replica identifier
//! - [`VersionVector`] - Per-replica causal clock
//! - [`Object`] / [`ObjectVariant`] - Single kinds and closed sets of kinds
//!
//! ## Canonicalization
//!
//! All objects are encoded using deterministic CBOR. See [`canonical`] module.

pub mod canonical;
pub mod error;
pub mod object;
pub mod types;
pub mod version_vector;

pub use canonical::{canonical_bytes, from_canonical_bytes};
pub use error::{CoreError, ErrorKind};
pub use object::{Blob, Node, Object, ObjectKind, ObjectVariant, Tree};
pub use types::{ObjectId, UserId};
pub use version_vector::{Causality, VersionVector};
