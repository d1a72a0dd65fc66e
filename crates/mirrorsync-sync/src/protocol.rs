//! Branch discovery protocol.
//!
//! One side runs a [`Responder`] that answers requests from its
//! [`BranchIndex`]; the other drives a [`SyncSession`] that asks for the
//! branch list, fetches each branch's state, and compares it against local
//! knowledge. Every exchange is a single request followed by a single
//! response, so neither side keeps protocol state between exchanges.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use mirrorsync_core::{Causality, ObjectId, UserId, VersionVector};

use crate::error::{Result, SyncError};
use crate::messages::{limits, Message};
use crate::transport::Connection;

/// Configuration for sync behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Timeout for waiting for a response.
    pub message_timeout: Duration,
    /// Largest frame payload accepted or sent.
    pub max_frame_len: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            message_timeout: Duration::from_secs(30),
            max_frame_len: limits::DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// A branch's advertised state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BranchState {
    pub version_vector: VersionVector,
    pub root_id: ObjectId,
}

/// Read access to the branches a replica knows about.
#[async_trait]
pub trait BranchIndex: Send + Sync {
    /// Every branch id known locally.
    async fn branch_ids(&self) -> Result<Vec<UserId>>;

    /// State of one branch, or `None` if it is unknown.
    async fn branch_state(&self, id: &UserId) -> Result<Option<BranchState>>;
}

/// Answers branch requests from a [`BranchIndex`].
pub struct Responder<'a, I: ?Sized> {
    index: &'a I,
}

impl<'a, I: BranchIndex + ?Sized> Responder<'a, I> {
    pub fn new(index: &'a I) -> Self {
        Self { index }
    }

    /// Build the response to a single request.
    ///
    /// Unknown branches are answered with an empty version vector and the
    /// zero root id.
    pub async fn respond(&self, request: &Message) -> Result<Message> {
        match request {
            Message::RqBranchList => Ok(Message::RsBranchList(self.index.branch_ids().await?)),
            Message::RqBranch { branch_id } => {
                let state = self.index.branch_state(branch_id).await?.unwrap_or_default();
                Ok(Message::RsBranch {
                    version_vector: state.version_vector,
                    root_id: state.root_id,
                })
            }
            other => Err(SyncError::UnexpectedMessage {
                expected: "request",
                got: other.name(),
            }),
        }
    }

    /// Answer requests until the peer closes the connection.
    ///
    /// Returns the number of requests answered.
    pub async fn serve<S>(
        &self,
        conn: &mut Connection<S>,
        cancel: &CancellationToken,
    ) -> Result<usize>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut answered = 0;
        loop {
            let request = match conn.receive(cancel).await {
                Ok(request) => request,
                Err(SyncError::Closed) => break,
                Err(e) => return Err(e),
            };
            let response = match self.respond(&request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(%request, error = %e, "rejecting request");
                    return Err(e);
                }
            };
            tracing::debug!(request = request.name(), response = response.name(), "answered");
            conn.send(&response, cancel).await?;
            answered += 1;
        }
        tracing::debug!(answered, "peer closed connection");
        Ok(answered)
    }
}

/// Outcome of comparing a peer's branches against ours.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Number of branches the peer advertised.
    pub remote_branches: usize,
    /// Branches where both sides hold the same version.
    pub up_to_date: Vec<UserId>,
    /// Branches where the peer is strictly ahead; candidates to pull.
    pub ahead: Vec<(UserId, BranchState)>,
    /// Branches where we are strictly ahead of the peer.
    pub behind: Vec<UserId>,
    /// Branches updated independently on both sides.
    pub concurrent: Vec<(UserId, BranchState)>,
}

impl SyncReport {
    /// Whether the peer has nothing we haven't seen.
    pub fn is_caught_up(&self) -> bool {
        self.ahead.is_empty() && self.concurrent.is_empty()
    }

    fn record(&mut self, id: UserId, remote: BranchState, local: &VersionVector) {
        match remote.version_vector.compare(local) {
            Causality::Equal => self.up_to_date.push(id),
            Causality::Dominates => self.ahead.push((id, remote)),
            Causality::Dominated => self.behind.push(id),
            Causality::Concurrent => self.concurrent.push((id, remote)),
        }
    }
}

/// The requesting side of a connection.
pub struct SyncSession<S> {
    conn: Connection<S>,
    config: SyncConfig,
    cancel: CancellationToken,
}

impl<S> SyncSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Create a new sync session.
    pub fn new(conn: Connection<S>, config: SyncConfig, cancel: CancellationToken) -> Self {
        Self {
            conn,
            config,
            cancel,
        }
    }

    /// Ask the peer which branches it has.
    pub async fn fetch_branch_list(&mut self) -> Result<Vec<UserId>> {
        match self.exchange(Message::RqBranchList).await? {
            Message::RsBranchList(ids) => Ok(ids),
            other => Err(unexpected("RsBranchList", &other)),
        }
    }

    /// Ask the peer for one branch's state.
    pub async fn fetch_branch(&mut self, branch_id: UserId) -> Result<BranchState> {
        match self.exchange(Message::RqBranch { branch_id }).await? {
            Message::RsBranch {
                version_vector,
                root_id,
            } => Ok(BranchState {
                version_vector,
                root_id,
            }),
            other => Err(unexpected("RsBranch", &other)),
        }
    }

    /// Fetch every branch the peer advertises and classify it against
    /// `local`.
    pub async fn discover<I>(&mut self, local: &I) -> Result<SyncReport>
    where
        I: BranchIndex + ?Sized,
    {
        let ids = self.fetch_branch_list().await?;
        let mut report = SyncReport {
            remote_branches: ids.len(),
            ..SyncReport::default()
        };

        for id in ids {
            let remote = self.fetch_branch(id).await?;
            let local_vv = local
                .branch_state(&id)
                .await?
                .map(|state| state.version_vector)
                .unwrap_or_default();
            report.record(id, remote, &local_vv);
        }

        tracing::debug!(
            remote = report.remote_branches,
            up_to_date = report.up_to_date.len(),
            ahead = report.ahead.len(),
            behind = report.behind.len(),
            concurrent = report.concurrent.len(),
            "discovery complete"
        );
        Ok(report)
    }

    /// Shut down our side of the connection so the responder stops.
    pub async fn finish(mut self) -> Result<()> {
        self.conn.shutdown().await
    }

    /// Recover the connection.
    pub fn into_connection(self) -> Connection<S> {
        self.conn
    }

    async fn exchange(&mut self, request: Message) -> Result<Message> {
        self.conn.send(&request, &self.cancel).await?;
        match tokio::time::timeout(self.config.message_timeout, self.conn.receive(&self.cancel))
            .await
        {
            Ok(response) => response,
            Err(_) => Err(SyncError::Timeout(format!(
                "waiting for response to {}",
                request.name()
            ))),
        }
    }
}

fn unexpected(expected: &'static str, got: &Message) -> SyncError {
    tracing::warn!(expected, got = got.name(), "unexpected response");
    SyncError::UnexpectedMessage {
        expected,
        got: got.name(),
    }
}
