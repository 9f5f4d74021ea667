//! # sshsync-sync
//!
//! One-way directory synchronization over an authenticated connection.
//!
//! Call [`SyncEngine::sync_folder`] to mirror a local tree onto a remote
//! directory, or [`SyncEngine::plan`] to see what that would do.

pub mod digest;
pub mod engine;
pub mod error;
pub mod runner;
pub mod shell;
pub mod transfer;

pub use digest::{digest_file, local_index, remote_index, DigestAlgorithm, DigestIndex};
pub use engine::{SyncEngine, SyncPlan, SyncReport};
pub use error::SyncError;
pub use runner::CommandRunner;
pub use transfer::{FileTransferer, SinkFactory};
