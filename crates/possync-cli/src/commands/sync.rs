//! Sync command - Run a pull, a push, or both
//!
//! Provides the `possync sync` CLI command which opens the database, runs
//! one sync operation in-process and prints the summary.

use anyhow::Result;
use clap::Args;
use tracing::info;

use possync_core::domain::SyncStatus;
use possync_sync::SyncSummary;

use crate::context::AppContext;
use crate::output::{emit_json, plural};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Only download and apply remote changes
    #[arg(long, conflicts_with = "push_only")]
    pub pull_only: bool,

    /// Only send local changes
    #[arg(long)]
    pub push_only: bool,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let formatter = ctx.formatter();
        let service = ctx.open_service().await?;

        formatter.info("Starting synchronization...");
        let summary = if self.pull_only {
            service.sync_pull().await?
        } else if self.push_only {
            service.sync_push().await?
        } else {
            service.sync_full().await?
        };

        info!(sync_type = %summary.sync_type, status = %summary.status, "Sync finished");

        if emit_json(ctx.format, &summary)? {
            return Ok(());
        }

        for line in describe(&summary) {
            formatter.info(&line);
        }
        match summary.status {
            SyncStatus::Conflict => formatter.warn(&format!(
                "{} need review. Run 'possync conflicts list'.",
                plural(summary.conflicts, "conflict")
            )),
            _ if summary.errors.is_empty() => formatter.success("Sync completed"),
            _ => formatter.warn("Sync completed with errors"),
        }
        for err in &summary.errors {
            formatter.info(&format!("  - {}", err));
        }

        Ok(())
    }
}

/// Human lines for the non-zero counters
fn describe(summary: &SyncSummary) -> Vec<String> {
    let mut lines = Vec::new();
    if summary.applied_changes > 0 {
        lines.push(format!("Applied:   {}", plural(summary.applied_changes, "change")));
    }
    if summary.skipped > 0 {
        lines.push(format!("Skipped:   {}", plural(summary.skipped, "change")));
    }
    if summary.sent_changes > 0 {
        lines.push(format!("Sent:      {}", plural(summary.sent_changes, "change")));
    }
    if lines.is_empty() && summary.conflicts == 0 {
        lines.push("Already up to date".to_string());
    }
    lines
}
