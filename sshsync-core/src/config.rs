//! `~/.ssh/config` parsing and host resolution.
//!
//! # Accepted syntax
//!
//! ```text
//! Host *.example.com
//!     User deploy
//!     Port 2222
//!     IdentityFile ~/.ssh/id_%h
//! ```
//!
//! Only lines made of exactly two whitespace-separated tokens are read. Lines
//! before the first `Host` are dropped, and blocks are matched in file order:
//! the first matching block wins and its options are returned verbatim.
//!
//! # API pattern
//!
//! - `fn_at(path: &Path, …)`: explicit location; used in tests with `TempDir`
//! - `fn(…)`: derives the location from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{io_err, ConfigError};
use crate::observer::{Event, Observer};
use crate::types::{
    ConfigEntry, ConfigOption, LocalIdentity, ResolvedOptions, DEFAULT_PORT, FALLBACK_USER,
};

// ---------------------------------------------------------------------------
// 1. Patterns
// ---------------------------------------------------------------------------

/// Compile a `Host` pattern into an unanchored matcher.
///
/// `*` matches any run of characters and `?` matches zero or one character.
/// Every other character, `.` included, matches only itself.
pub fn parse_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    let mut expr = String::with_capacity(pattern.len() * 2);
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push_str(".?"),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    Regex::new(&expr).map_err(|source| ConfigError::Pattern {
        pattern: pattern.to_owned(),
        source,
    })
}

// ---------------------------------------------------------------------------
// 2. Parsing
// ---------------------------------------------------------------------------

/// A parsed config source: `Host` blocks in file order.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    entries: Vec<ConfigEntry>,
}

impl ConfigFile {
    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    /// Options of the first block whose pattern matches `hostname`, or an
    /// empty slice when none does.
    pub fn options_for(&self, hostname: &str) -> &[ConfigOption] {
        self.entries
            .iter()
            .find(|entry| entry.matches(hostname))
            .map(|entry| entry.options.as_slice())
            .unwrap_or(&[])
    }
}

/// Parse config text into `Host` blocks.
pub fn parse(source: &str) -> Result<ConfigFile, ConfigError> {
    let mut entries: Vec<ConfigEntry> = Vec::new();

    for line in source.lines() {
        let mut fields = line.split_whitespace();
        let (Some(key), Some(value), None) = (fields.next(), fields.next(), fields.next()) else {
            continue;
        };
        let value = value.trim_matches('"');

        if key == "Host" {
            entries.push(ConfigEntry {
                pattern: parse_pattern(value)?,
                options: Vec::new(),
            });
        } else if let Some(current) = entries.last_mut() {
            current.options.push(ConfigOption::new(key, value));
        }
    }

    Ok(ConfigFile { entries })
}

/// `<home>/.ssh/config`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".ssh").join("config")
}

/// `<home>/.ssh/config` (convenience: uses `dirs::home_dir()`).
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    Ok(config_path_at(&home))
}

/// Read and parse the config source at `path`.
pub fn load_at(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    parse(&contents)
}

/// Options for `hostname` from the config at `path`, or an empty list when
/// the source is missing or malformed. The failure is reported to `observer`.
pub fn options_for_host_at(
    path: &Path,
    hostname: &str,
    observer: &dyn Observer,
) -> Vec<ConfigOption> {
    match load_at(path) {
        Ok(config) => config.options_for(hostname).to_vec(),
        Err(error) => {
            observer.event(&Event::ConfigUnavailable {
                path,
                error: &error,
            });
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// 3. Resolution
// ---------------------------------------------------------------------------

/// Explicit `User` option, else the local login name, else `root`.
pub fn resolve_username(options: &[ConfigOption], local: &LocalIdentity) -> String {
    options
        .iter()
        .find(|opt| opt.key == "User")
        .map(|opt| opt.value.clone())
        .or_else(|| local.user.clone())
        .unwrap_or_else(|| FALLBACK_USER.to_owned())
}

/// Expand `~`, `%d`, `%u`, `%l`, `%h` and `%r` in `template`.
///
/// Substituted text is never scanned again, so a home directory that happens
/// to contain `%h` stays intact. Unknown `%` sequences are kept literally.
pub fn expand_placeholders(
    template: &str,
    remote_host: &str,
    remote_user: &str,
    local: &LocalIdentity,
) -> String {
    let home = || {
        local
            .home
            .as_ref()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_default()
    };

    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '~' => out.push_str(&home()),
            '%' => match chars.peek().copied() {
                Some('d') => {
                    chars.next();
                    out.push_str(&home());
                }
                Some('u') => {
                    chars.next();
                    out.push_str(local.user.as_deref().unwrap_or_default());
                }
                Some('l') => {
                    chars.next();
                    out.push_str(local.host.as_deref().unwrap_or_default());
                }
                Some('h') => {
                    chars.next();
                    out.push_str(remote_host);
                }
                Some('r') => {
                    chars.next();
                    out.push_str(remote_user);
                }
                _ => out.push('%'),
            },
            other => out.push(other),
        }
    }
    out
}

/// Derive the effective endpoint for `hostname` from its matched options.
///
/// `HostName` and `Port` use their last occurrence. `IdentityFile` values are
/// expanded against the effective hostname and username, in file order.
pub fn resolve_options(
    hostname: &str,
    options: &[ConfigOption],
    local: &LocalIdentity,
    observer: &dyn Observer,
) -> ResolvedOptions {
    let username = resolve_username(options, local);
    let mut effective_host = hostname.to_owned();
    let mut port = DEFAULT_PORT;

    for opt in options {
        match opt.key.as_str() {
            "HostName" => effective_host = opt.value.clone(),
            "Port" => match opt.value.parse::<u16>() {
                Ok(p) if p != 0 => port = p,
                _ => observer.event(&Event::InvalidPort { value: &opt.value }),
            },
            _ => {}
        }
    }

    let identity_files = options
        .iter()
        .filter(|opt| opt.key == "IdentityFile")
        .map(|opt| {
            PathBuf::from(expand_placeholders(
                &opt.value,
                &effective_host,
                &username,
                local,
            ))
        })
        .collect();

    ResolvedOptions {
        hostname: effective_host,
        port,
        username,
        identity_files,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
