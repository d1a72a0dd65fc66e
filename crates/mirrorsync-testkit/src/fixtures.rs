//! Test fixtures and helpers.
//!
//! Common setup code for integration tests. Directories follow the
//! `objects/` and `branches/` layout a repository uses, so a fixture's
//! [`root`](Replica::root) can be handed straight to a repository.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use mirrorsync_core::{Blob, ObjectId, UserId};
use mirrorsync_store::{io, Branch};

/// A replica identity with its own temporary directory.
///
/// The directory is removed when the fixture is dropped.
pub struct Replica {
    pub user: UserId,
    dir: TempDir,
}

impl Replica {
    /// Create a replica with a random identity.
    pub fn new() -> Self {
        Self::with_user(UserId::random())
    }

    /// Create a replica with a deterministic identity.
    pub fn with_seed(seed: u8) -> Self {
        Self::with_user(UserId::from_bytes([seed; 32]))
    }

    fn with_user(user: UserId) -> Self {
        Self {
            user,
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    /// The replica's root directory.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn object_dir(&self) -> PathBuf {
        self.root().join("objects")
    }

    pub fn branch_dir(&self) -> PathBuf {
        self.root().join("branches")
    }

    /// Load or create this replica's own branch.
    pub fn open_branch(&self) -> Branch {
        Branch::load_or_create(self.branch_dir(), self.object_dir(), self.user)
            .expect("failed to open branch")
    }

    /// Store a blob directly in the object store.
    pub fn store_blob(&self, data: &[u8]) -> ObjectId {
        io::store(&self.object_dir(), &Blob::new(data.to_vec())).expect("failed to store blob")
    }
}

impl Default for Replica {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple replicas with distinct deterministic identities.
pub fn replicas(count: usize) -> Vec<Replica> {
    (0..count).map(|i| Replica::with_seed(i as u8 + 1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replicas_are_isolated() {
        let all = replicas(3);
        assert_eq!(all.len(), 3);
        assert_ne!(all[0].user, all[1].user);
        assert_ne!(all[0].root(), all[1].root());
    }

    #[test]
    fn test_store_blob_lands_in_object_dir() {
        let replica = Replica::with_seed(7);
        let id = replica.store_blob(b"fixture");
        assert!(io::contains(&replica.object_dir(), &id));
        assert!(!io::contains(&Replica::with_seed(7).object_dir(), &id));
    }

    #[test]
    fn test_open_branch_persists() {
        let replica = Replica::new();
        let branch = replica.open_branch();
        assert!(branch.file_path().starts_with(replica.branch_dir()));
        assert!(branch.file_path().is_file());
    }
}
