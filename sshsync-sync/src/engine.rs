//! Digest-gated folder synchronization.
//!
//! ## `sync_folder`: 5-step protocol
//!
//! 1. Digest the local tree.
//! 2. Digest the remote tree with one remote command.
//! 3. `mkdir -p` the remote root (outcome ignored).
//! 4. `rm` every remote-only file, stopping at the first failure.
//! 5. Upload every file that is new or whose digest differs, stopping at the
//!    first failure.
//!
//! Nothing is rolled back. Running again after a failure converges.

use std::path::Path;
use std::sync::Arc;

use sshsync_core::{Event, Observer};
use sshsync_transport::Connection;

use crate::digest::{self, DigestAlgorithm, DigestIndex};
use crate::error::SyncError;
use crate::runner::CommandRunner;
use crate::shell;
use crate::transfer::FileTransferer;

// ---------------------------------------------------------------------------
// Plan and report
// ---------------------------------------------------------------------------

/// Work needed to make the remote tree match the local one. Keys are
/// relative paths, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Present remotely, absent locally.
    pub delete: Vec<String>,
    /// Absent remotely, or present with a different digest.
    pub upload: Vec<String>,
}

impl SyncPlan {
    /// Pure comparison of two indexes.
    pub fn between(local: &DigestIndex, remote: &DigestIndex) -> Self {
        let delete = remote
            .keys()
            .filter(|key| !local.contains_key(*key))
            .cloned()
            .collect();
        let upload = local
            .iter()
            .filter(|(key, digest)| remote.get(*key) != Some(*digest))
            .map(|(key, _)| key.clone())
            .collect();
        Self { delete, upload }
    }

    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.upload.is_empty()
    }
}

/// Outcome of a completed [`SyncEngine::sync_folder`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub deleted: Vec<String>,
    pub uploaded: Vec<String>,
    /// Local files that already matched the remote copy.
    pub unchanged: usize,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Composes digesting, remote commands and transfers into a one-way sync.
#[derive(Clone)]
pub struct SyncEngine {
    runner: CommandRunner,
    transferer: FileTransferer,
    algorithm: DigestAlgorithm,
    observer: Arc<dyn Observer>,
}

impl SyncEngine {
    pub fn new(observer: Arc<dyn Observer>) -> Self {
        Self {
            runner: CommandRunner::new(observer.clone()),
            transferer: FileTransferer::new(observer.clone()),
            algorithm: DigestAlgorithm::default(),
            observer,
        }
    }

    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Replace the transferer, e.g. to capture remote `tar` output.
    pub fn with_transferer(mut self, transferer: FileTransferer) -> Self {
        self.transferer = transferer;
        self
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Both indexes, local first.
    pub fn indexes(
        &self,
        conn: &dyn Connection,
        local_root: &Path,
        remote_root: &str,
    ) -> Result<(DigestIndex, DigestIndex), SyncError> {
        let local = digest::local_index(local_root, self.algorithm)?;
        let remote = digest::remote_index(&self.runner, conn, remote_root, self.algorithm)?;
        Ok((local, remote))
    }

    /// What [`sync_folder`](Self::sync_folder) would do, without changing
    /// anything on either side.
    pub fn plan(
        &self,
        conn: &dyn Connection,
        local_root: &Path,
        remote_root: &str,
    ) -> Result<SyncPlan, SyncError> {
        let (local, remote) = self.indexes(conn, local_root, remote_root)?;
        Ok(SyncPlan::between(&local, &remote))
    }

    /// Make the tree under `remote_root` mirror `local_root`.
    pub fn sync_folder(
        &self,
        conn: &dyn Connection,
        local_root: &Path,
        remote_root: &str,
    ) -> Result<SyncReport, SyncError> {
        let (local, remote) = self.indexes(conn, local_root, remote_root)?;

        let _ = self
            .runner
            .run(conn, &format!("mkdir -p {}", shell::escape(remote_root)));

        let plan = SyncPlan::between(&local, &remote);

        for key in &plan.delete {
            let path = shell::join(remote_root, key);
            self.observer.event(&Event::Delete { path: &path });
            self.runner.run(conn, &format!("rm {}", shell::escape(&path)))?;
        }

        for key in &plan.upload {
            let Some(local_digest) = local.get(key) else {
                continue;
            };
            let path = shell::join(remote_root, key);
            self.observer.event(&Event::Upload {
                path: &path,
                local_digest,
                remote_digest: remote.get(key).map(String::as_str),
            });
            self.transferer.send(conn, &local_root.join(key), &path)?;
        }

        Ok(SyncReport {
            unchanged: local.len() - plan.upload.len(),
            deleted: plan.delete,
            uploaded: plan.upload,
        })
    }
}
