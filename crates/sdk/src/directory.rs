//! Remote session directory boundary.
//!
//! The directory maps wallet addresses to platform users and their stored
//! preferences. It is consulted to recover a session when nothing is
//! stored locally, and kept up to date as a best-effort mirror of local
//! changes. Local transitions never wait for it.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{StreamExt, channel::mpsc::UnboundedReceiver};

use crate::{
    error::DirectoryError,
    types::{Address, RemoteSessionEntry, UserId},
};

#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    async fn find_by_address(
        &self,
        address: &Address,
    ) -> Result<Option<RemoteSessionEntry>, DirectoryError>;

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<RemoteSessionEntry>, DirectoryError>;

    async fn upsert(&self, entry: &RemoteSessionEntry) -> Result<(), DirectoryError>;

    async fn set_active(
        &self,
        user_id: &UserId,
        address: &Address,
        active: bool,
    ) -> Result<(), DirectoryError>;
}

/// Change to mirror into the directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirectoryOp {
    Upsert(RemoteSessionEntry),
    SetActive { user_id: UserId, address: Address, active: bool },
}

impl DirectoryOp {
    pub async fn apply(&self, directory: &dyn RemoteDirectory) -> Result<(), DirectoryError> {
        match self {
            DirectoryOp::Upsert(entry) => directory.upsert(entry).await,
            DirectoryOp::SetActive { user_id, address, active } => {
                directory.set_active(user_id, address, *active).await
            },
        }
    }
}

/// Runs `request` against the directory, giving up after `timeout`.
pub(crate) async fn bounded<T>(
    timeout: Duration,
    request: impl Future<Output = Result<T, DirectoryError>>,
) -> Result<T, DirectoryError> {
    tokio::time::timeout(timeout, request)
        .await
        .unwrap_or(Err(DirectoryError::Timeout))
}

/// Propagates local changes into the directory in order.
///
/// Operations that fail because the directory is unreachable or slow stay
/// in a backlog which is retried, ahead of the new operations, whenever the
/// next batch arrives. Operations the directory rejects outright are logged
/// and dropped; retrying them would only hold up everything queued behind.
pub struct DirectoryMirror {
    directory: Arc<dyn RemoteDirectory>,
    timeout: Duration,
    backlog: VecDeque<DirectoryOp>,
}

impl DirectoryMirror {
    pub fn new(directory: Arc<dyn RemoteDirectory>, timeout: Duration) -> Self {
        Self { directory, timeout, backlog: VecDeque::new() }
    }

    /// Operations not yet accepted by the directory.
    pub fn backlog(&self) -> usize { self.backlog.len() }

    /// Queues `ops` behind the backlog and pushes as many operations as the
    /// directory accepts, stopping at the first transient failure.
    /// Returns the number of operations left in the backlog.
    pub async fn submit(&mut self, ops: Vec<DirectoryOp>) -> usize {
        self.backlog.extend(ops);
        while let Some(op) = self.backlog.front() {
            match bounded(self.timeout, op.apply(self.directory.as_ref())).await {
                Ok(()) => {
                    self.backlog.pop_front();
                },
                Err(DirectoryError::Rejected(reason)) => {
                    tracing::warn!(target: "directory", ?op, %reason, "directory rejected change, dropping it");
                    self.backlog.pop_front();
                },
                Err(err) => {
                    tracing::warn!(
                        target: "directory",
                        %err,
                        backlog = self.backlog.len(),
                        "directory unavailable, will retry on next change"
                    );
                    break;
                },
            }
        }
        self.backlog.len()
    }

    /// Consumes batches until the sending side (the reconciler) is dropped.
    pub async fn run(mut self, mut batches: UnboundedReceiver<Vec<DirectoryOp>>) {
        while let Some(ops) = batches.next().await {
            self.submit(ops).await;
        }
        if !self.backlog.is_empty() {
            tracing::warn!(target: "directory", backlog = self.backlog.len(), "mirror stopped with unsynced changes");
        }
    }
}
