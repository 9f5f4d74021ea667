//! `sshsync resolve`: show what the ssh config yields for a host.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use sshsync_core::{
    config::{default_config_path, options_for_host_at},
    resolve_options, LocalIdentity,
};

use super::observer;

/// Arguments for `sshsync resolve`.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Host name or alias as written in ~/.ssh/config.
    pub host: String,

    /// ssh config file to read instead of ~/.ssh/config.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl ResolveArgs {
    pub fn run(self) -> Result<()> {
        let path = match self.config {
            Some(path) => path,
            None => default_config_path().context("could not locate ~/.ssh/config")?,
        };
        let observer = observer();
        let options = options_for_host_at(&path, &self.host, observer.as_ref());
        let resolved = resolve_options(
            &self.host,
            &options,
            &LocalIdentity::detect(),
            observer.as_ref(),
        );

        println!("hostname  {}", resolved.hostname);
        println!("port      {}", resolved.port);
        println!("user      {}", resolved.username);
        for identity in &resolved.identity_files {
            println!("identity  {}", identity.display());
        }
        Ok(())
    }
}
