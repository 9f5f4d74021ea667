//! Subcommand implementations and the connection plumbing they share.

pub mod plan;
pub mod resolve;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use sshsync_core::{LogObserver, Observer};
use sshsync_sync::{DigestAlgorithm, SyncEngine};
use sshsync_transport::{Connection, Connector, LocalTransport, OpenSshTransport, Transport};

/// Endpoint and tree arguments shared by `sync` and `plan`.
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Host name or alias as written in ~/.ssh/config.
    pub host: String,

    /// Local directory to mirror.
    pub local: PathBuf,

    /// Remote directory to mirror into.
    pub remote: String,

    /// Compare files by SHA-256 instead of SHA-1.
    #[arg(long)]
    pub sha256: bool,

    /// Treat this machine as the remote host (commands run through `sh -c`).
    #[arg(long = "local")]
    pub local_transport: bool,

    /// ssh config file to read instead of ~/.ssh/config.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// ssh client program.
    #[arg(long, value_name = "PROGRAM", default_value = "ssh")]
    pub ssh: PathBuf,
}

impl TargetArgs {
    /// `host:remote`, for messages.
    pub fn label(&self) -> String {
        format!("{}:{}", self.host, self.remote)
    }

    pub fn engine(&self, observer: Arc<dyn Observer>) -> SyncEngine {
        let algorithm = if self.sha256 {
            DigestAlgorithm::Sha256
        } else {
            DigestAlgorithm::Sha1
        };
        SyncEngine::new(observer).with_algorithm(algorithm)
    }

    /// Resolve the host and open an authenticated connection.
    pub fn connect(&self, observer: Arc<dyn Observer>) -> Result<Box<dyn Connection>> {
        if self.local_transport {
            let connector = Connector::new(LocalTransport::new(), observer);
            Ok(Box::new(self.dial(&connector)?))
        } else {
            let mut transport = OpenSshTransport::with_program(&self.ssh);
            if let Some(path) = &self.config {
                transport = transport.with_config(path);
            }
            let connector = Connector::new(transport, observer);
            Ok(Box::new(self.dial(&connector)?))
        }
    }

    fn dial<T: Transport>(&self, connector: &Connector<T>) -> Result<T::Connection> {
        let connection = match &self.config {
            Some(path) => connector.connect_with_config(&self.host, path),
            None => connector.connect(&self.host),
        };
        connection.with_context(|| format!("cannot connect to '{}'", self.host))
    }
}

pub fn observer() -> Arc<dyn Observer> {
    Arc::new(LogObserver)
}
