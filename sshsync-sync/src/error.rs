//! Error types for sshsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use sshsync_transport::TransportError;

/// All errors that can arise from a sync operation. Every one of them aborts
/// the operation that raised it; nothing is retried.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The local tree could not be traversed.
    #[error("cannot walk local tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// Opening or preparing a session failed.
    #[error("session error: {0}")]
    Session(#[from] TransportError),

    /// A remote command failed. `output` holds whatever it printed.
    #[error("remote command `{command}` failed: {source}")]
    Command {
        command: String,
        output: String,
        #[source]
        source: TransportError,
    },

    /// Streaming the archive into the remote unpack failed.
    #[error("cannot stream {local} to {remote}: {source}")]
    Transfer {
        local: PathBuf,
        remote: String,
        #[source]
        source: std::io::Error,
    },

    /// Both sides of a transfer stopped without reporting an outcome.
    #[error("transfer to {remote} aborted")]
    Aborted { remote: String },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
