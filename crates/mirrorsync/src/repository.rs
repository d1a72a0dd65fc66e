//! The Repository: one replica's object store and branches.
//!
//! A repository owns a local branch it writes to and tracks the branches of
//! other replicas it has learned about. It answers discovery requests from
//! peers and runs discovery against them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use mirrorsync_core::{ObjectId, UserId, VersionVector};
use mirrorsync_store::{list_branches, Branch};
use mirrorsync_sync::{
    BranchIndex, BranchState, Connection, Responder, SyncConfig, SyncReport, SyncSession,
};

use crate::error::{RepoError, Result};

/// Configuration for a [`Repository`].
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Root of the content-addressed object store.
    pub object_dir: PathBuf,
    /// Directory holding one file per branch.
    pub branch_dir: PathBuf,
    /// Sync configuration.
    pub sync: SyncConfig,
}

impl RepositoryConfig {
    /// Lay out `objects/` and `branches/` under `root`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            object_dir: root.join("objects"),
            branch_dir: root.join("branches"),
            sync: SyncConfig::default(),
        }
    }
}

/// A replica.
pub struct Repository {
    config: RepositoryConfig,
    local: UserId,
    branches: RwLock<BTreeMap<UserId, Branch>>,
}

impl Repository {
    /// Open a repository for `local`, creating directories and the local
    /// branch as needed.
    ///
    /// Every branch file already present is loaded.
    pub fn open(config: RepositoryConfig, local: UserId) -> Result<Self> {
        std::fs::create_dir_all(&config.object_dir).map_err(mirrorsync_store::StoreError::from)?;

        let mut branches = BTreeMap::new();
        let own = Branch::load_or_create(&config.branch_dir, &config.object_dir, local)?;
        branches.insert(local, own);

        for user in list_branches(&config.branch_dir)? {
            if user != local {
                let branch = Branch::load(&config.branch_dir, &config.object_dir, user)?;
                branches.insert(user, branch);
            }
        }

        tracing::debug!(
            local = %local,
            branches = branches.len(),
            objects = %config.object_dir.display(),
            "opened repository"
        );

        Ok(Self {
            config,
            local,
            branches: RwLock::new(branches),
        })
    }

    /// The replica this repository writes as.
    pub fn local_id(&self) -> UserId {
        self.local
    }

    /// Get the configuration.
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Local Branch
    // ─────────────────────────────────────────────────────────────────────────

    /// Write `data` at `path` on the local branch.
    ///
    /// Returns `false` if nothing changed or the branch file moved on under
    /// us; see [`Branch::maybe_store`].
    pub async fn write(&self, path: impl AsRef<Path>, data: impl Into<Bytes>) -> Result<bool> {
        let mut branches = self.branches.write().await;
        let branch = branches
            .get_mut(&self.local)
            .ok_or(RepoError::UnknownBranch(self.local))?;
        Ok(branch.maybe_store(path.as_ref(), data)?)
    }

    /// Read the blob at `path` on the local branch.
    pub async fn read(&self, path: impl AsRef<Path>) -> Result<Bytes> {
        self.read_branch(&self.local, path).await
    }

    /// Read the blob at `path` on any known branch.
    pub async fn read_branch(&self, user: &UserId, path: impl AsRef<Path>) -> Result<Bytes> {
        let branches = self.branches.read().await;
        let branch = branches.get(user).ok_or(RepoError::UnknownBranch(*user))?;
        Ok(branch.read(path.as_ref())?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Branch Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Every known branch, in id order.
    pub async fn branch_ids(&self) -> Vec<UserId> {
        self.branches.read().await.keys().copied().collect()
    }

    /// Current state of a known branch.
    pub async fn branch_state(&self, user: &UserId) -> Option<BranchState> {
        self.branches.read().await.get(user).map(|branch| BranchState {
            version_vector: branch.version_vector().clone(),
            root_id: *branch.root_object_id(),
        })
    }

    /// Pick up branch files created since the repository was opened.
    ///
    /// Returns how many new branches were loaded.
    pub async fn refresh(&self) -> Result<usize> {
        let mut branches = self.branches.write().await;
        let mut loaded = 0;
        for user in list_branches(&self.config.branch_dir)? {
            if !branches.contains_key(&user) {
                let branch = Branch::load(&self.config.branch_dir, &self.config.object_dir, user)?;
                branches.insert(user, branch);
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Answer a peer's discovery requests until it closes the connection.
    ///
    /// Returns the number of requests answered.
    pub async fn serve<S>(&self, mut conn: Connection<S>, cancel: &CancellationToken) -> Result<usize>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        Ok(Responder::new(self).serve(&mut conn, cancel).await?)
    }

    /// Discover a peer's branches and compare them with ours.
    pub async fn sync_with<S>(
        &self,
        conn: Connection<S>,
        cancel: &CancellationToken,
    ) -> Result<SyncReport>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut session = SyncSession::new(conn, self.config.sync.clone(), cancel.clone());
        let report = session.discover(self).await?;
        session.finish().await?;
        Ok(report)
    }

    /// Adopt a remote state for `user`'s branch.
    ///
    /// The root object must already be in the object store. Returns `false`
    /// if the state does not strictly dominate what we have.
    pub async fn adopt(
        &self,
        user: UserId,
        version_vector: &VersionVector,
        root_id: ObjectId,
    ) -> Result<bool> {
        let mut branches = self.branches.write().await;
        if !branches.contains_key(&user) {
            let branch =
                Branch::load_or_create(&self.config.branch_dir, &self.config.object_dir, user)?;
            branches.insert(user, branch);
        }
        let branch = branches.get_mut(&user).ok_or(RepoError::UnknownBranch(user))?;

        let adopted = branch.maybe_adopt(version_vector, root_id)?;
        if adopted {
            tracing::debug!(user = %user, root = %root_id, "adopted remote branch state");
        }
        Ok(adopted)
    }
}

#[async_trait]
impl BranchIndex for Repository {
    async fn branch_ids(&self) -> mirrorsync_sync::Result<Vec<UserId>> {
        Ok(Repository::branch_ids(self).await)
    }

    async fn branch_state(&self, id: &UserId) -> mirrorsync_sync::Result<Option<BranchState>> {
        Ok(Repository::branch_state(self, id).await)
    }
}
