//! sshsync core library: host resolution from ssh config, domain types,
//! diagnostics, errors.
//!
//! Public API surface:
//! - [`config`]: parse `~/.ssh/config`, match hosts, expand placeholders
//! - [`types`]: config model and [`ResolvedOptions`]
//! - [`observer`]: injectable event sink shared by every component
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod observer;
pub mod types;

pub use config::{
    expand_placeholders, parse, parse_pattern, resolve_options, resolve_username, ConfigFile,
};
pub use error::ConfigError;
pub use observer::{Event, LogObserver, NullObserver, Observer};
pub use types::{ConfigEntry, ConfigOption, LocalIdentity, ResolvedOptions, DEFAULT_PORT};
