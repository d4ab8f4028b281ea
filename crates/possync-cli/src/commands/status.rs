//! Status command - Show sync statistics

use anyhow::Result;
use clap::Args;

use crate::context::AppContext;
use crate::output::emit_json;

#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let formatter = ctx.formatter();
        let service = ctx.open_service().await?;
        let stats = service.get_stats().await?;

        if emit_json(ctx.format, &stats)? {
            return Ok(());
        }

        formatter.success("Sync status");
        formatter.field(
            "Last sync",
            &stats
                .last_sync
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "never".to_string()),
        );
        formatter.field("Pending changes", &stats.pending_changes.to_string());
        formatter.field("Open conflicts", &stats.unresolved_conflicts.to_string());
        formatter.field(
            "Auto-sync",
            &if stats.auto_sync_enabled {
                format!("every {}s", stats.sync_interval)
            } else {
                "off".to_string()
            },
        );

        if stats.unresolved_conflicts > 0 {
            formatter.warn("Some rows are waiting for conflict resolution");
        }

        Ok(())
    }
}
