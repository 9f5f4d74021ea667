//! `sshsync plan`: machine-readable list of pending operations.

use anyhow::{Context, Result};
use clap::Args;

use super::{observer, TargetArgs};

/// Arguments for `sshsync plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

impl PlanArgs {
    /// Prints one `delete <path>` or `upload <path>` line per operation,
    /// deletions first, in the order a sync would perform them.
    pub fn run(self) -> Result<()> {
        let observer = observer();
        let conn = self.target.connect(observer.clone())?;
        let plan = self
            .target
            .engine(observer)
            .plan(conn.as_ref(), &self.target.local, &self.target.remote)
            .with_context(|| format!("planning failed for '{}'", self.target.label()))?;

        for key in &plan.delete {
            println!("delete {key}");
        }
        for key in &plan.upload {
            println!("upload {key}");
        }
        Ok(())
    }
}
