//! Check command - Probe the sync server

use anyhow::Result;
use clap::Args;

use crate::context::AppContext;
use crate::output::emit_json;

#[derive(Debug, Args)]
pub struct CheckCommand {}

impl CheckCommand {
    /// Prints the connection status; an unreachable server is not an error
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let formatter = ctx.formatter();
        let service = ctx.open_service().await?;
        let status = service.check_connection().await;

        if emit_json(ctx.format, &status)? {
            return Ok(());
        }

        if status.connected {
            formatter.success("Sync server reachable");
            if let Some(server_time) = status.server_time {
                formatter.field("Server time", &server_time.to_rfc3339());
            }
        } else {
            formatter.error(&status.message);
        }

        Ok(())
    }
}
