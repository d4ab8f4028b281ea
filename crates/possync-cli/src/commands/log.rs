//! Log command - Inspect and trim the sync log

use anyhow::Result;
use clap::Subcommand;

use crate::context::AppContext;
use crate::output::emit_json;

#[derive(Debug, Subcommand)]
pub enum LogCommand {
    /// Show the most recent entries
    Show {
        /// Maximum entries to show
        #[arg(long, short = 'n')]
        limit: Option<u32>,
    },
    /// Delete old entries
    Clean {
        /// Delete entries older than this many days (default: sync.log_retention_days)
        #[arg(long)]
        days: Option<u32>,
    },
}

impl LogCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let formatter = ctx.formatter();
        let service = ctx.open_service().await?;

        match self {
            LogCommand::Show { limit } => {
                let entries = service.get_log(*limit).await?;
                if emit_json(ctx.format, &entries)? {
                    return Ok(());
                }
                if entries.is_empty() {
                    formatter.info("No sync activity recorded");
                    return Ok(());
                }
                for entry in &entries {
                    formatter.info(&format!(
                        "{}  {:<5} {:<10} {:<12} {:<9} {}",
                        entry.started_at().format("%Y-%m-%d %H:%M:%S"),
                        entry.sync_type().as_str(),
                        entry.operation(),
                        entry.table_name().unwrap_or("-"),
                        entry.status().as_str(),
                        entry.error_message().unwrap_or("")
                    ));
                }
            }
            LogCommand::Clean { days } => {
                let removed = service.clean_log(*days).await?;
                if emit_json(ctx.format, &serde_json::json!({ "removed": removed }))? {
                    return Ok(());
                }
                formatter.success(&format!("Removed {} old log entries", removed));
            }
        }

        Ok(())
    }
}
