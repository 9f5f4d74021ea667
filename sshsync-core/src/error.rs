//! Error types for sshsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while reading or parsing an ssh config source.
///
/// None of these are fatal to a connection attempt: the connector downgrades
/// every variant to an empty option set.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `Host` pattern did not translate into a valid matcher.
    #[error("invalid host pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.ssh/config`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
