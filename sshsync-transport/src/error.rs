//! Error types for sshsync-transport.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to load or use one private key. Loading failures are per key: the
/// connector skips the key and keeps going.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("cannot read key file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse key file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ssh_key::Error,
    },

    /// Passphrase-protected keys are not supported.
    #[error("key file {path} is encrypted")]
    Encrypted { path: PathBuf },

    #[error("no key at index {index} (keychain holds {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("signing with key {index} failed: {source}")]
    Sign {
        index: usize,
        #[source]
        source: signature::Error,
    },
}

/// Failure of a session-level operation against the secure channel provider.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The local helper process (`ssh`, `sh`) could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("session I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote command ran but exited unsuccessfully. `code` is `None`
    /// when it was killed by a signal.
    #[error("remote command `{command}` exited with {}", describe_exit(.code))]
    ExitStatus { command: String, code: Option<i32> },

    /// `run` was called twice on one session.
    #[error("session already ran a command")]
    AlreadyStarted,

    /// `stdin_pipe` was called twice on one session.
    #[error("session stdin pipe already taken")]
    PipeTaken,

    /// Catch-all for provider-specific failures.
    #[error("{0}")]
    Other(String),
}

/// Failure to establish an authenticated connection. Fatal to the caller.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("failed to connect to {user}@{address}: {source}")]
    Dial {
        address: String,
        user: String,
        #[source]
        source: TransportError,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "a signal".to_string(),
    }
}

/// Convenience constructor for [`KeyError::Read`].
pub(crate) fn read_err(path: impl Into<PathBuf>, source: std::io::Error) -> KeyError {
    KeyError::Read {
        path: path.into(),
        source,
    }
}
