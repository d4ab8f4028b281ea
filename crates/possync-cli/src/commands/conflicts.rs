//! Conflicts command - List and resolve sync conflicts
//!
//! Provides the `possync conflicts` CLI command which:
//! 1. Lists open (or all) conflicts
//! 2. Shows both snapshots of one conflict side by side
//! 3. Resolves one or all conflicts by keeping the local or remote version

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};

use possync_core::domain::{newtypes::ConflictId, Resolution, SyncConflict};

use crate::context::AppContext;
use crate::output::{emit_json, plural, OutputFormatter};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Strategy {
    /// Keep the local row; it is pushed on the next sync
    Local,
    /// Overwrite the local row with the remote version
    Remote,
}

impl From<Strategy> for Resolution {
    fn from(s: Strategy) -> Self {
        match s {
            Strategy::Local => Resolution::Local,
            Strategy::Remote => Resolution::Remote,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ConflictsCommand {
    /// List conflicts
    List {
        /// Include resolved conflicts
        #[arg(long)]
        all: bool,
    },
    /// Show both versions of a conflict
    Show {
        /// Conflict ID
        id: i64,
    },
    /// Resolve one conflict
    Resolve {
        /// Conflict ID
        id: i64,
        #[arg(long, value_enum)]
        strategy: Strategy,
    },
    /// Resolve every open conflict the same way
    ResolveAll {
        #[arg(long, value_enum)]
        strategy: Strategy,
    },
}

impl ConflictsCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let formatter = ctx.formatter();
        let service = ctx.open_service().await?;

        match self {
            ConflictsCommand::List { all } => {
                let conflicts = service.get_conflicts(*all).await?;
                if emit_json(ctx.format, &conflicts)? {
                    return Ok(());
                }
                if conflicts.is_empty() {
                    formatter.success("No conflicts");
                    return Ok(());
                }
                formatter.warn(&plural(conflicts.len() as u64, "conflict"));
                for conflict in &conflicts {
                    formatter.info(&summary_line(conflict));
                }
            }
            ConflictsCommand::Show { id } => {
                let conflict = service
                    .get_conflicts(true)
                    .await?
                    .into_iter()
                    .find(|c| c.id() == Some(ConflictId::new(*id)))
                    .with_context(|| format!("Conflict {} not found", id))?;
                if emit_json(ctx.format, &conflict)? {
                    return Ok(());
                }
                print_details(&*formatter, &conflict);
            }
            ConflictsCommand::Resolve { id, strategy } => {
                let resolved = service
                    .resolve_conflict(ConflictId::new(*id), (*strategy).into())
                    .await?;
                if emit_json(ctx.format, &resolved)? {
                    return Ok(());
                }
                formatter.success(&format!(
                    "Conflict {} resolved, kept {} version",
                    id,
                    Resolution::from(*strategy)
                ));
            }
            ConflictsCommand::ResolveAll { strategy } => {
                let result = service.resolve_all_conflicts((*strategy).into()).await?;
                let json = serde_json::json!({
                    "resolved": result.resolved,
                    "failed": result.failed,
                    "errors": result.errors,
                });
                if emit_json(ctx.format, &json)? {
                    return Ok(());
                }
                formatter.success(&format!("Resolved {}", plural(result.resolved, "conflict")));
                if result.failed > 0 {
                    formatter.warn(&format!("{} failed", plural(result.failed, "conflict")));
                    for err in &result.errors {
                        formatter.info(&format!("  - {}", err));
                    }
                }
            }
        }

        Ok(())
    }
}

fn summary_line(conflict: &SyncConflict) -> String {
    let id = conflict
        .id()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    let state = match conflict.resolution() {
        Some(resolution) => format!("resolved ({})", resolution),
        None => "open".to_string(),
    };
    format!(
        "#{:<5} {}#{}  detected {}  {}",
        id,
        conflict.table_name(),
        conflict.record_id(),
        conflict.created_at().format("%Y-%m-%d %H:%M"),
        state
    )
}

fn print_details(formatter: &dyn OutputFormatter, conflict: &SyncConflict) {
    formatter.success(&summary_line(conflict));

    let local = conflict.local_data();
    let remote = conflict.remote_data();
    let mut columns: Vec<&str> = local.columns().chain(remote.columns()).collect();
    columns.sort_unstable();
    columns.dedup();

    for column in columns {
        let l = local.get(column).map(ToString::to_string).unwrap_or_default();
        let r = remote.get(column).map(ToString::to_string).unwrap_or_default();
        let marker = if l == r { " " } else { "*" };
        formatter.info(&format!("{} {:<20} local: {:<24} remote: {}", marker, column, l, r));
    }
}
