//! Config-driven connection establishment.
//!
//! Resolution is best-effort everywhere except the final dial: a missing or
//! malformed config means "no options", an unloadable identity file means
//! "one key fewer". Only the transport's dial/authenticate step can fail.

use std::path::Path;
use std::sync::Arc;

use sshsync_core::{
    config::{self, options_for_host_at},
    resolve_options, ConfigOption, Event, LocalIdentity, Observer, ResolvedOptions,
};

use crate::error::ConnectError;
use crate::keychain::KeyChain;
use crate::session::{DialTarget, Transport};

/// Composes config resolution, key loading and a [`Transport`].
pub struct Connector<T: Transport> {
    transport: T,
    observer: Arc<dyn Observer>,
    local: LocalIdentity,
}

impl<T: Transport> Connector<T> {
    pub fn new(transport: T, observer: Arc<dyn Observer>) -> Self {
        Self {
            transport,
            observer,
            local: LocalIdentity::detect(),
        }
    }

    /// Replace the detected local identity (home, login, host name).
    pub fn with_local_identity(mut self, local: LocalIdentity) -> Self {
        self.local = local;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Resolve `hostname` against the config at `config_path`.
    pub fn resolve_at(&self, config_path: &Path, hostname: &str) -> ResolvedOptions {
        let options = options_for_host_at(config_path, hostname, self.observer.as_ref());
        self.resolve_with(hostname, &options)
    }

    /// Resolve `hostname` against `~/.ssh/config`.
    pub fn resolve(&self, hostname: &str) -> ResolvedOptions {
        let path = match self.local.home.as_deref() {
            Some(home) => config::config_path_at(home),
            None => match config::default_config_path() {
                Ok(path) => path,
                Err(error) => {
                    self.observer.event(&Event::ConfigUnavailable {
                        path: Path::new("~/.ssh/config"),
                        error: &error,
                    });
                    return self.resolve_with(hostname, &[]);
                }
            },
        };
        self.resolve_at(&path, hostname)
    }

    /// Load every identity file in order, skipping the ones that fail.
    pub fn load_keys(&self, resolved: &ResolvedOptions) -> KeyChain {
        let mut keys = KeyChain::new();
        for path in &resolved.identity_files {
            if let Err(error) = keys.load_pem(path) {
                self.observer.event(&Event::KeySkipped {
                    path: path.as_path(),
                    error: &error,
                });
            }
        }
        keys
    }

    /// Open an authenticated connection to `hostname` using `~/.ssh/config`.
    pub fn connect(&self, hostname: &str) -> Result<T::Connection, ConnectError> {
        let resolved = self.resolve(hostname);
        self.dial(&resolved)
    }

    /// Open an authenticated connection to `hostname` using the config at
    /// `config_path`.
    pub fn connect_with_config(
        &self,
        hostname: &str,
        config_path: &Path,
    ) -> Result<T::Connection, ConnectError> {
        let resolved = self.resolve_at(config_path, hostname);
        self.dial(&resolved)
    }

    /// Dial an already resolved endpoint.
    pub fn dial(&self, resolved: &ResolvedOptions) -> Result<T::Connection, ConnectError> {
        let keys = self.load_keys(resolved);
        let target = DialTarget::tcp(&resolved.hostname, resolved.port, &resolved.username);
        let address = target.address();
        self.observer.event(&Event::Dialing {
            address: &address,
            user: &target.user,
            keys: keys.len(),
        });
        self.transport
            .dial(&target, &keys)
            .map_err(|source| ConnectError::Dial {
                address,
                user: target.user.clone(),
                source,
            })
    }

    fn resolve_with(&self, hostname: &str, options: &[ConfigOption]) -> ResolvedOptions {
        resolve_options(hostname, options, &self.local, self.observer.as_ref())
    }
}
