//! Domain types for host resolution.
//!
//! All path fields use `PathBuf`; option values stay as raw strings until
//! [`crate::config::resolve_options`] interprets them.

use std::fmt;
use std::path::PathBuf;

use regex::Regex;

/// Port used when no `Port` option applies.
pub const DEFAULT_PORT: u16 = 22;

/// Username used when neither a `User` option nor the local login is known.
pub const FALLBACK_USER: &str = "root";

// ---------------------------------------------------------------------------
// Config file model
// ---------------------------------------------------------------------------

/// One `Key Value` line attached to a `Host` block, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOption {
    pub key: String,
    pub value: String,
}

impl ConfigOption {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, self.value)
    }
}

/// A `Host <pattern>` block and the options that follow it.
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    /// Compiled matcher for the block's host pattern.
    pub pattern: Regex,
    pub options: Vec<ConfigOption>,
}

impl ConfigEntry {
    /// Unanchored match: the pattern may match anywhere inside `hostname`.
    pub fn matches(&self, hostname: &str) -> bool {
        self.pattern.is_match(hostname)
    }
}

// ---------------------------------------------------------------------------
// Resolution results
// ---------------------------------------------------------------------------

/// Effective connection parameters for one hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    /// Placeholder-expanded `IdentityFile` paths, in config order.
    pub identity_files: Vec<PathBuf>,
}

impl ResolvedOptions {
    /// `host:port` form handed to the transport.
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

/// Facts about the local machine used for username fallback and placeholder
/// expansion. Each field is `None` when the lookup failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalIdentity {
    pub home: Option<PathBuf>,
    pub user: Option<String>,
    pub host: Option<String>,
}

impl LocalIdentity {
    /// Query the running process's environment.
    pub fn detect() -> Self {
        Self {
            home: dirs::home_dir(),
            user: whoami::fallible::username().ok(),
            host: whoami::fallible::hostname().ok(),
        }
    }
}
