//! sshsync: mirror a local directory onto a remote host over ssh.
//!
//! # Usage
//!
//! ```text
//! sshsync sync <host> <local> <remote> [--dry-run] [--sha256] [--local] [--config <path>]
//! sshsync plan <host> <local> <remote> [--sha256] [--local] [--config <path>]
//! sshsync resolve <host> [--config <path>]
//! ```
//!
//! Log verbosity follows `RUST_LOG` and defaults to `info`.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{plan::PlanArgs, resolve::ResolveArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "sshsync",
    version,
    about = "Mirror a local directory onto a remote host over ssh",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload new and changed files, delete remote files missing locally.
    Sync(SyncArgs),

    /// List the uploads and deletions a sync would perform.
    Plan(PlanArgs),

    /// Show the endpoint and identity files ~/.ssh/config yields for a host.
    Resolve(ResolveArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Plan(args) => args.run(),
        Commands::Resolve(args) => args.run(),
    }
}
