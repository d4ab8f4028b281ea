//! Command dispatcher
//!
//! Maps each `sync-*` command name to a `SyncService` call. Every outcome,
//! including unknown commands and malformed arguments, is returned inside a
//! [`CommandResponse`]; `dispatch` itself cannot fail.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use possync_core::domain::{newtypes::ConflictId, Resolution, SyncConfigUpdate};
use possync_sync::{SyncError, SyncService};

pub const SYNC_FULL: &str = "sync-full";
pub const SYNC_PULL: &str = "sync-pull";
pub const SYNC_PUSH: &str = "sync-push";
pub const CHECK_CONNECTION: &str = "sync-check-connection";
pub const GET_STATS: &str = "sync-get-stats";
pub const CONFIGURE: &str = "sync-configure";
pub const GET_CONFIG: &str = "sync-get-config";
pub const GET_LOG: &str = "sync-get-log";
pub const GET_CONFLICTS: &str = "sync-get-conflicts";
pub const RESOLVE_CONFLICT: &str = "sync-resolve-conflict";
pub const CLEAN_LOG: &str = "sync-clean-log";

/// Every command understood by [`CommandHandler::dispatch`]
pub const COMMANDS: [&str; 11] = [
    SYNC_FULL,
    SYNC_PULL,
    SYNC_PUSH,
    CHECK_CONNECTION,
    GET_STATS,
    CONFIGURE,
    GET_CONFIG,
    GET_LOG,
    GET_CONFLICTS,
    RESOLVE_CONFLICT,
    CLEAN_LOG,
];

/// Returns true for the commands that run a sync
pub fn is_sync_command(command: &str) -> bool {
    matches!(command, SYNC_FULL | SYNC_PULL | SYNC_PUSH)
}

// ============================================================================
// Response envelope
// ============================================================================

/// Envelope returned for every command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Serializes the envelope for the wire
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            json!({"success": false, "error": format!("Failed to encode response: {e}")})
                .to_string()
        })
    }
}

// ============================================================================
// Arguments
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LogArgs {
    limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CleanLogArgs {
    days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConflictsArgs {
    include_resolved: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResolveArgs {
    conflict_id: ConflictId,
    resolution: Resolution,
}

#[derive(Debug, Error)]
enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid arguments for {command}: {message}")]
    InvalidArguments { command: String, message: String },

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

fn parse_args<T: DeserializeOwned>(command: &str, args: Value) -> Result<T, CommandError> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| CommandError::InvalidArguments {
        command: command.to_string(),
        message: e.to_string(),
    })
}

/// Commands without arguments accept `null` or `{}` only
fn no_args(command: &str, args: &Value) -> Result<(), CommandError> {
    match args {
        Value::Null => Ok(()),
        Value::Object(map) if map.is_empty() => Ok(()),
        _ => Err(CommandError::InvalidArguments {
            command: command.to_string(),
            message: "this command takes no arguments".to_string(),
        }),
    }
}

// ============================================================================
// Handler
// ============================================================================

/// Routes commands to a shared `SyncService`
#[derive(Clone)]
pub struct CommandHandler {
    service: Arc<SyncService>,
}

impl CommandHandler {
    pub fn new(service: Arc<SyncService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<SyncService> {
        &self.service
    }

    /// Runs `command` with `args` and wraps the outcome
    #[tracing::instrument(skip(self, args))]
    pub async fn dispatch(&self, command: &str, args: Value) -> CommandResponse {
        match self.run(command, args).await {
            Ok(data) => {
                debug!(command, "Command succeeded");
                CommandResponse::ok(data)
            }
            Err(e) => {
                if let CommandError::Sync(ref err) = e {
                    debug!(command, kind = %err.kind, error = %err, "Command failed");
                } else {
                    warn!(command, error = %e, "Command rejected");
                }
                CommandResponse::failure(e.to_string())
            }
        }
    }

    async fn run(&self, command: &str, args: Value) -> Result<Value, CommandError> {
        let service = &self.service;

        let data = match command {
            SYNC_FULL => {
                no_args(command, &args)?;
                serde_json::to_value(service.sync_full().await?)?
            }
            SYNC_PULL => {
                no_args(command, &args)?;
                serde_json::to_value(service.sync_pull().await?)?
            }
            SYNC_PUSH => {
                no_args(command, &args)?;
                serde_json::to_value(service.sync_push().await?)?
            }
            CHECK_CONNECTION => {
                no_args(command, &args)?;
                serde_json::to_value(service.check_connection().await)?
            }
            GET_STATS => {
                no_args(command, &args)?;
                serde_json::to_value(service.get_stats().await?)?
            }
            CONFIGURE => {
                let update: SyncConfigUpdate = parse_args(command, args)?;
                serde_json::to_value(service.configure(update).await?)?
            }
            GET_CONFIG => {
                no_args(command, &args)?;
                serde_json::to_value(service.get_config().await?)?
            }
            GET_LOG => {
                let LogArgs { limit } = parse_args(command, args)?;
                serde_json::to_value(service.get_log(limit).await?)?
            }
            GET_CONFLICTS => {
                let ConflictsArgs { include_resolved } = parse_args(command, args)?;
                serde_json::to_value(service.get_conflicts(include_resolved).await?)?
            }
            RESOLVE_CONFLICT => {
                let ResolveArgs {
                    conflict_id,
                    resolution,
                } = parse_args(command, args)?;
                serde_json::to_value(service.resolve_conflict(conflict_id, resolution).await?)?
            }
            CLEAN_LOG => {
                let CleanLogArgs { days } = parse_args(command, args)?;
                json!({ "removed": service.clean_log(days).await? })
            }
            other => return Err(CommandError::UnknownCommand(other.to_string())),
        };

        Ok(data)
    }
}
