//! Branch: one replica's versioned root pointer.
//!
//! A branch owns the triple `(user_id, root_id, version_vector)` and keeps it
//! in a single file under the branch directory, named after the user id in
//! hex. Every change to the triple replaces that file atomically, so a reader
//! never observes a root id paired with the wrong vector.
//!
//! The root points at a [`Tree`]; [`Branch::maybe_store`] writes a blob at a
//! path inside it, copying every tree on the way down.

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use mirrorsync_core::canonical::{canonical_bytes, from_canonical_bytes};
use mirrorsync_core::{Blob, Node, Object, ObjectId, Tree, UserId, VersionVector};

use crate::error::{Result, StoreError};
use crate::fs::atomic_write;
use crate::io;

/// Current branch file format.
///
/// Files with a higher format number were written by a newer release and
/// are rejected rather than misread.
pub const BRANCH_FORMAT: u8 = 1;

/// On-disk branch record.
#[derive(Debug, Serialize, Deserialize)]
struct BranchRecord {
    format: u8,
    user_id: UserId,
    root_id: ObjectId,
    version_vector: VersionVector,
}

/// A replica's mutable root pointer plus its version vector.
///
/// Mutating methods take `&mut self`; callers sharing a branch across tasks
/// wrap it in a mutex so the read-decide-write sequence in
/// [`maybe_store`](Self::maybe_store) has a single writer.
#[derive(Debug)]
pub struct Branch {
    file_path: PathBuf,
    object_dir: PathBuf,
    user_id: UserId,
    root_id: ObjectId,
    version_vector: VersionVector,
}

impl Branch {
    /// Load the branch file for `user_id`, or create a fresh branch.
    ///
    /// A fresh branch has the zero vector and the [`ObjectId::ZERO`] root and
    /// is persisted immediately.
    pub fn load_or_create(
        branch_dir: impl AsRef<Path>,
        object_dir: impl AsRef<Path>,
        user_id: UserId,
    ) -> Result<Self> {
        let branch_dir = branch_dir.as_ref();
        match Self::load(branch_dir, object_dir.as_ref(), user_id) {
            Err(StoreError::PathNotFound(_)) => {}
            other => return other,
        }

        fs::create_dir_all(branch_dir)?;
        let branch = Self {
            file_path: branch_file_path(branch_dir, &user_id),
            object_dir: object_dir.as_ref().to_path_buf(),
            user_id,
            root_id: ObjectId::ZERO,
            version_vector: VersionVector::new(),
        };
        branch.persist(&branch.root_id, &branch.version_vector)?;
        tracing::debug!(user = %user_id, "created branch");
        Ok(branch)
    }

    /// Load an existing branch file.
    ///
    /// Fails with a not-found error if there is no file for `user_id`.
    pub fn load(branch_dir: &Path, object_dir: &Path, user_id: UserId) -> Result<Self> {
        let file_path = branch_file_path(branch_dir, &user_id);
        let record = read_record(&file_path)?;

        if record.user_id != user_id {
            return Err(StoreError::InvalidBranchFile {
                path: file_path.display().to_string(),
                reason: format!("file belongs to {}", record.user_id),
            });
        }

        Ok(Self {
            file_path,
            object_dir: object_dir.to_path_buf(),
            user_id,
            root_id: record.root_id,
            version_vector: record.version_vector,
        })
    }

    /// Owner of this branch.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Current root object id.
    pub fn root_object_id(&self) -> &ObjectId {
        &self.root_id
    }

    /// Overwrite the in-memory root pointer.
    ///
    /// Neither persists nor touches the version vector; for reconciliation
    /// code that manages both itself.
    pub fn set_root_object_id(&mut self, id: ObjectId) {
        self.root_id = id;
    }

    /// Current version vector.
    pub fn version_vector(&self) -> &VersionVector {
        &self.version_vector
    }

    /// Path of the persisted branch file.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Object store this branch's root lives in.
    pub fn object_dir(&self) -> &Path {
        &self.object_dir
    }

    /// Write `data` as a blob at `path` and advance the branch.
    ///
    /// Returns `true` if the write produced a new root, which is then stored,
    /// versioned and persisted. Returns `false` if the write was stale: either
    /// it would leave the root unchanged, or the branch file moved on since
    /// this handle last saw it. Nothing is written in that case.
    pub fn maybe_store(&mut self, path: &Path, data: impl Into<Bytes>) -> Result<bool> {
        match self.store(path, data.into()) {
            Ok(()) => Ok(true),
            Err(StoreError::Conflict { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn store(&mut self, path: &Path, data: Bytes) -> Result<()> {
        let components = split_path(path)?;
        let blob = Blob::new(data);

        let mut pending = Vec::new();
        let root = (!self.root_id.is_zero()).then_some(self.root_id);
        let new_root = self.insert_at(root, &components, blob.into(), &mut pending)?;

        let proposed = self.version_vector.incremented(self.user_id);
        if new_root == self.root_id {
            tracing::debug!(user = %self.user_id, path = %path.display(), "write leaves root unchanged");
            return Err(self.conflict(self.version_vector.clone()));
        }
        self.ensure_current()?;

        for node in &pending {
            io::store_node(&self.object_dir, node)?;
        }
        self.commit(new_root, proposed)
    }

    /// Copy-on-write insert of `leaf` at `components` below the tree `tree_id`.
    ///
    /// Returns the id of the rewritten tree; every new node is pushed onto
    /// `pending`, leaf first, so children are stored before their parents.
    fn insert_at(
        &self,
        tree_id: Option<ObjectId>,
        components: &[String],
        leaf: Node,
        pending: &mut Vec<Node>,
    ) -> Result<ObjectId> {
        let mut tree = match tree_id {
            Some(id) => io::load::<Tree>(&self.object_dir, &id)?,
            None => Tree::new(),
        };

        let (name, rest) = components
            .split_first()
            .ok_or_else(|| StoreError::InvalidPath("empty path".into()))?;
        let existing = tree.get(name).copied();

        let child = if rest.is_empty() {
            if let Some(id) = existing {
                if let Node::Tree(_) = io::load_variant::<Node>(&self.object_dir, &id)? {
                    return Err(StoreError::InvalidPath(format!("{} is a directory", name)));
                }
            }
            let id = node_id(&leaf)?;
            pending.push(leaf);
            id
        } else {
            let subtree = match existing {
                Some(id) => match io::load_variant::<Node>(&self.object_dir, &id)? {
                    Node::Tree(_) => Some(id),
                    Node::Blob(_) => {
                        return Err(StoreError::InvalidPath(format!("{} is not a directory", name)))
                    }
                },
                None => None,
            };
            self.insert_at(subtree, rest, leaf, pending)?
        };

        tree.insert(name.clone(), child);
        let id = tree.compute_id()?;
        pending.push(tree.into());
        Ok(id)
    }

    /// Adopt a remote state if it strictly dominates this branch.
    ///
    /// The root object must already be in the local store. Returns `false`
    /// for equal, older or concurrent states.
    pub fn maybe_adopt(&mut self, version_vector: &VersionVector, root_id: ObjectId) -> Result<bool> {
        match self.adopt(version_vector, root_id) {
            Ok(()) => Ok(true),
            Err(StoreError::Conflict { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Strict form of [`maybe_adopt`](Self::maybe_adopt): a non-dominating
    /// state is a [`StoreError::Conflict`].
    pub fn adopt(&mut self, version_vector: &VersionVector, root_id: ObjectId) -> Result<()> {
        if !version_vector.dominates(&self.version_vector) {
            return Err(self.conflict(version_vector.clone()));
        }
        if !root_id.is_zero() && !io::contains(&self.object_dir, &root_id) {
            return Err(StoreError::ObjectNotFound(root_id));
        }
        self.ensure_current()?;

        let merged = self.version_vector.merged(version_vector);
        self.commit(root_id, merged)
    }

    /// Read the blob at `path`.
    pub fn read(&self, path: &Path) -> Result<Bytes> {
        let id = self.resolve(path)?;
        match io::load_variant::<Node>(&self.object_dir, &id)? {
            Node::Blob(blob) => Ok(blob.data),
            Node::Tree(_) => Err(StoreError::InvalidPath(format!(
                "{} is a directory",
                path.display()
            ))),
        }
    }

    /// Resolve `path` to the id of the object it names.
    pub fn resolve(&self, path: &Path) -> Result<ObjectId> {
        let components = split_path(path)?;
        let not_found = || StoreError::PathNotFound(path.display().to_string());

        if self.root_id.is_zero() {
            return Err(not_found());
        }

        let mut current = self.root_id;
        for name in &components {
            let tree = match io::load_variant::<Node>(&self.object_dir, &current)? {
                Node::Tree(tree) => tree,
                Node::Blob(_) => return Err(not_found()),
            };
            current = *tree.get(name).ok_or_else(not_found)?;
        }
        Ok(current)
    }

    /// Fail with a conflict if the branch file no longer matches this handle.
    ///
    /// Guards against a second handle on the same file having committed in
    /// the meantime.
    fn ensure_current(&self) -> Result<()> {
        let on_disk = read_record(&self.file_path)?;
        if on_disk.version_vector != self.version_vector {
            tracing::warn!(
                user = %self.user_id,
                local = ?self.version_vector,
                on_disk = ?on_disk.version_vector,
                "branch file changed underneath this handle"
            );
            return Err(self.conflict(on_disk.version_vector));
        }
        Ok(())
    }

    fn commit(&mut self, root_id: ObjectId, version_vector: VersionVector) -> Result<()> {
        self.persist(&root_id, &version_vector)?;
        tracing::debug!(
            user = %self.user_id,
            root = %root_id,
            version = version_vector.total(),
            "branch advanced"
        );
        self.root_id = root_id;
        self.version_vector = version_vector;
        Ok(())
    }

    fn persist(&self, root_id: &ObjectId, version_vector: &VersionVector) -> Result<()> {
        let record = BranchRecord {
            format: BRANCH_FORMAT,
            user_id: self.user_id,
            root_id: *root_id,
            version_vector: version_vector.clone(),
        };
        atomic_write(&self.file_path, &canonical_bytes(&record)?)
    }

    fn conflict(&self, proposed: VersionVector) -> StoreError {
        StoreError::Conflict {
            user_id: self.user_id,
            local: self.version_vector.clone(),
            proposed,
        }
    }
}

/// Branch file for `user_id` under `branch_dir`.
pub fn branch_file_path(branch_dir: &Path, user_id: &UserId) -> PathBuf {
    branch_dir.join(user_id.to_hex())
}

/// Users that have a branch file under `branch_dir`, in id order.
///
/// Entries whose name is not a user id (temporary files, strays) are
/// skipped. A missing directory has no branches.
pub fn list_branches(branch_dir: &Path) -> Result<Vec<UserId>> {
    let entries = match fs::read_dir(branch_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut users = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(user) = entry.file_name().to_str().and_then(|n| UserId::from_hex(n).ok()) {
            users.push(user);
        }
    }
    users.sort();
    Ok(users)
}

fn read_record(file_path: &Path) -> Result<BranchRecord> {
    let bytes = match fs::read(file_path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == IoErrorKind::NotFound => {
            return Err(StoreError::PathNotFound(file_path.display().to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let invalid = |reason: String| StoreError::InvalidBranchFile {
        path: file_path.display().to_string(),
        reason,
    };

    let record: BranchRecord = from_canonical_bytes(&bytes).map_err(|e| invalid(e.to_string()))?;
    if record.format > BRANCH_FORMAT {
        return Err(invalid(format!("unsupported format {}", record.format)));
    }
    Ok(record)
}

fn node_id(node: &Node) -> Result<ObjectId> {
    Ok(ObjectId::hash(&node.encode_tagged()?))
}

/// Split a relative path into validated tree entry names.
fn split_path(path: &Path) -> Result<Vec<String>> {
    let invalid = || StoreError::InvalidPath(path.display().to_string());

    let mut names = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(name) => names.push(name.to_str().ok_or_else(invalid)?.to_owned()),
            Component::CurDir => {}
            _ => return Err(invalid()),
        }
    }
    if names.is_empty() {
        return Err(invalid());
    }
    Ok(names)
}
