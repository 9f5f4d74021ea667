//! `sshsync sync`: mirror a local tree onto a remote directory.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use sshsync_sync::{SyncPlan, SyncReport};

use super::{observer, TargetArgs};

/// Arguments for `sshsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Show what would be uploaded or deleted without changing anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let observer = observer();
        let conn = self.target.connect(observer.clone())?;
        let engine = self.target.engine(observer);
        let label = self.target.label();

        if self.dry_run {
            let plan = engine
                .plan(conn.as_ref(), &self.target.local, &self.target.remote)
                .with_context(|| format!("dry run failed for '{label}'"))?;
            print_plan(&label, &plan);
        } else {
            let report = engine
                .sync_folder(conn.as_ref(), &self.target.local, &self.target.remote)
                .with_context(|| format!("sync failed for '{label}'"))?;
            print_report(&label, &report);
        }
        Ok(())
    }
}

fn print_plan(label: &str, plan: &SyncPlan) {
    if plan.is_empty() {
        println!("[dry-run] {} '{label}': nothing to do", "✓".green());
        return;
    }
    println!(
        "[dry-run] {} '{label}' would upload {}, delete {}",
        "✓".green(),
        plan.upload.len(),
        plan.delete.len()
    );
    for key in &plan.delete {
        println!("  -  {key}");
    }
    for key in &plan.upload {
        println!("  ~  {key}");
    }
}

fn print_report(label: &str, report: &SyncReport) {
    if report.uploaded.is_empty() && report.deleted.is_empty() {
        println!(
            "{} '{label}': nothing to do ({} unchanged)",
            "✓".green(),
            report.unchanged
        );
        return;
    }
    println!(
        "{} '{label}' synced ({} uploaded, {} deleted, {} unchanged)",
        "✓".green(),
        report.uploaded.len(),
        report.deleted.len(),
        report.unchanged
    );
    for key in &report.deleted {
        println!("  ✗  {key}");
    }
    for key in &report.uploaded {
        println!("  ✎  {key}");
    }
}
