//! Content-addressed object storage on the local filesystem.
//!
//! Objects live under a root directory at a path derived from their id:
//! the lower-case hex id split as `aa/bb/<remaining 60 chars>`, which keeps
//! any single directory down to at most 256 entries for the first two
//! levels. Each file holds the canonical tagged encoding of one object.
//!
//! All functions take the root directory explicitly; there is no ambient
//! store location.

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use mirrorsync_core::object::decode_tagged;
use mirrorsync_core::{Node, Object, ObjectId, ObjectVariant};

use crate::error::{Result, StoreError};
use crate::fs::atomic_write;

/// Filesystem location of `id` under `root`.
pub fn object_path(root: &Path, id: &ObjectId) -> PathBuf {
    let hex = id.to_hex();
    root.join(&hex[..2]).join(&hex[2..4]).join(&hex[4..])
}

/// Store an object and return its content address.
///
/// Storing an object that is already present rewrites identical bytes, so
/// concurrent stores of the same object are harmless.
pub fn store<O: Object>(root: &Path, object: &O) -> Result<ObjectId> {
    let bytes = object.encode_tagged()?;
    store_encoded(root, &bytes)
}

/// Store a [`Node`] of either kind.
pub fn store_node(root: &Path, node: &Node) -> Result<ObjectId> {
    let bytes = node.encode_tagged()?;
    store_encoded(root, &bytes)
}

fn store_encoded(root: &Path, bytes: &[u8]) -> Result<ObjectId> {
    let id = ObjectId::hash(bytes);
    let path = object_path(root, &id);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    atomic_write(&path, bytes)?;
    tracing::trace!(object = %id, len = bytes.len(), "stored object");
    Ok(id)
}

/// Load an object of a single, statically known kind.
pub fn load<O: Object>(root: &Path, id: &ObjectId) -> Result<O> {
    load_variant(root, id)
}

/// Load an object as any member of the closed kind set `V`.
///
/// Fails with a kind mismatch if the stored tag is not in the set.
pub fn load_variant<V: ObjectVariant>(root: &Path, id: &ObjectId) -> Result<V> {
    let bytes = read_verified(root, id)?;
    Ok(decode_tagged(&bytes)?)
}

/// Read raw object bytes, checking they still hash to `id`.
pub fn read_verified(root: &Path, id: &ObjectId) -> Result<Vec<u8>> {
    let bytes = match fs::read(object_path(root, id)) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == IoErrorKind::NotFound => {
            return Err(StoreError::ObjectNotFound(*id))
        }
        Err(e) => return Err(e.into()),
    };

    let actual = ObjectId::hash(&bytes);
    if actual != *id {
        tracing::warn!(expected = %id, %actual, "object failed integrity check");
        return Err(StoreError::IntegrityMismatch {
            expected: *id,
            actual,
        });
    }
    Ok(bytes)
}

/// Whether an object is stored under `id`.
pub fn contains(root: &Path, id: &ObjectId) -> bool {
    object_path(root, id).is_file()
}

/// Remove the object stored under `id`.
///
/// Returns whether anything was removed; removing a missing object is not an
/// error. Shard directories are left in place.
pub fn remove(root: &Path, id: &ObjectId) -> Result<bool> {
    match fs::remove_file(object_path(root, id)) {
        Ok(()) => {
            tracing::trace!(object = %id, "removed object");
            Ok(true)
        }
        Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
