//! Config command - View and change sync settings
//!
//! Two kinds of settings are involved:
//! - the sync endpoint (URL, tenant, token, auto-sync), stored in the POS
//!   database and changed with `possync config set`
//! - the application file (`config.yaml`), checked with `possync config validate`

use anyhow::Result;
use clap::{Args, Subcommand};
use tracing::info;

use possync_core::domain::SyncConfigUpdate;

use crate::context::AppContext;
use crate::output::emit_json;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the sync endpoint settings and file locations
    Show,
    /// Change sync endpoint settings
    Set(SetArgs),
    /// Validate the application config file
    Validate,
}

#[derive(Debug, Default, Args)]
pub struct SetArgs {
    /// Base URL of the sync API (empty string clears it)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Tenant identifier
    #[arg(long)]
    pub empresa_id: Option<i64>,

    /// Bearer token (empty string clears it)
    #[arg(long)]
    pub token: Option<String>,

    /// Run a full sync automatically
    #[arg(long)]
    pub auto_sync: Option<bool>,

    /// Seconds between automatic syncs (60-3600)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Master switch for all sync operations
    #[arg(long)]
    pub enabled: Option<bool>,
}

impl SetArgs {
    fn into_update(self) -> SyncConfigUpdate {
        SyncConfigUpdate {
            api_url: self.api_url,
            empresa_id: self.empresa_id,
            auth_token: self.token,
            auto_sync: self.auto_sync,
            sync_interval: self.interval,
            enabled: self.enabled,
        }
    }
}

impl ConfigCommand {
    pub async fn execute(self, ctx: &AppContext) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(ctx).await,
            ConfigCommand::Set(args) => execute_set(args, ctx).await,
            ConfigCommand::Validate => execute_validate(ctx),
        }
    }
}

async fn execute_show(ctx: &AppContext) -> Result<()> {
    let formatter = ctx.formatter();
    let service = ctx.open_service().await?;
    let endpoint = service.get_config().await?;

    let json = serde_json::json!({
        "config_file": ctx.config_path,
        "database": ctx.config.database.path,
        "endpoint": endpoint,
        "tables": ctx.config.sync.tables,
    });
    if emit_json(ctx.format, &json)? {
        return Ok(());
    }

    formatter.success("Sync configuration");
    formatter.field("Config file", &ctx.config_path.display().to_string());
    formatter.field("Database", &ctx.config.database.path.display().to_string());
    formatter.field("API URL", endpoint.api_url.as_deref().unwrap_or("(not set)"));
    formatter.field(
        "Empresa",
        &endpoint
            .empresa_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "(not set)".to_string()),
    );
    formatter.field("Token", endpoint.auth_token.as_deref().unwrap_or("(not set)"));
    formatter.field("Enabled", &endpoint.enabled.to_string());
    formatter.field("Auto-sync", &endpoint.auto_sync.to_string());
    formatter.field("Interval", &format!("{}s", endpoint.sync_interval));
    formatter.field("Tables", &ctx.config.sync.tables.join(", "));

    Ok(())
}

async fn execute_set(args: SetArgs, ctx: &AppContext) -> Result<()> {
    let formatter = ctx.formatter();
    let update = args.into_update();

    if update == SyncConfigUpdate::default() {
        formatter.warn("Nothing to change; pass at least one option");
        return Ok(());
    }

    let service = ctx.open_service().await?;
    let saved = service.configure(update).await?;
    info!("Sync endpoint configuration updated");

    if emit_json(ctx.format, &saved)? {
        return Ok(());
    }
    formatter.success("Configuration saved");
    Ok(())
}

fn execute_validate(ctx: &AppContext) -> Result<()> {
    let formatter = ctx.formatter();
    let errors = ctx.config.validate();

    let json = serde_json::json!({
        "valid": errors.is_empty(),
        "errors": errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
    });
    if !emit_json(ctx.format, &json)? {
        if errors.is_empty() {
            formatter.success(&format!("{} is valid", ctx.config_path.display()));
        } else {
            for error in &errors {
                formatter.error(&error.to_string());
            }
        }
    }

    if !errors.is_empty() {
        anyhow::bail!("Configuration has {} error(s)", errors.len());
    }
    Ok(())
}
