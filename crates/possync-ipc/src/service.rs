//! D-Bus service implementation for possync
//!
//! Exposes the command dispatcher to UI clients on the session bus:
//!
//! - `com.possync.Sync.Commands` - `Invoke(command, args_json)` for every
//!   command, plus direct methods for the common ones
//!
//! `SyncFinished(command, success)` is emitted after every sync command.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use possync_sync::SyncService;

use crate::commands::{
    is_sync_command, CommandHandler, CommandResponse, CHECK_CONNECTION, GET_STATS, SYNC_FULL,
    SYNC_PULL, SYNC_PUSH,
};

/// D-Bus well-known name for the possync daemon
pub const DBUS_NAME: &str = "com.possync.Sync";

/// D-Bus object path for the service
pub const DBUS_PATH: &str = "/com/possync/Sync";

// ============================================================================
// Commands interface
// ============================================================================

/// D-Bus interface wrapping a [`CommandHandler`]
///
/// Every method answers with the JSON envelope of `CommandResponse`.
pub struct SyncCommandsInterface {
    handler: CommandHandler,
}

impl SyncCommandsInterface {
    pub fn new(handler: CommandHandler) -> Self {
        Self { handler }
    }

    /// Parses `args_json` and dispatches; an empty string means no arguments
    async fn handle(&self, command: &str, args_json: &str) -> CommandResponse {
        let args = if args_json.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(args_json) {
                Ok(value) => value,
                Err(e) => {
                    return CommandResponse::failure(format!("Invalid JSON arguments: {e}"));
                }
            }
        };
        self.handler.dispatch(command, args).await
    }

    async fn handle_and_notify(
        &self,
        command: &str,
        args_json: &str,
        ctxt: &zbus::SignalContext<'_>,
    ) -> String {
        let response = self.handle(command, args_json).await;

        if is_sync_command(command) {
            if let Err(e) = Self::sync_finished(ctxt, command, response.success).await {
                warn!(error = %e, command, "Failed to emit SyncFinished");
            }
        }

        response.to_json()
    }
}

#[zbus::interface(name = "com.possync.Sync.Commands")]
impl SyncCommandsInterface {
    /// Runs any `sync-*` command
    ///
    /// # Arguments
    /// * `command` - Command name, e.g. `sync-get-log`
    /// * `args_json` - JSON object with the command arguments, or `""`
    async fn invoke(
        &self,
        command: String,
        args_json: String,
        #[zbus(signal_context)] ctxt: zbus::SignalContext<'_>,
    ) -> String {
        self.handle_and_notify(&command, &args_json, &ctxt).await
    }

    async fn sync_full(&self, #[zbus(signal_context)] ctxt: zbus::SignalContext<'_>) -> String {
        self.handle_and_notify(SYNC_FULL, "", &ctxt).await
    }

    async fn sync_pull(&self, #[zbus(signal_context)] ctxt: zbus::SignalContext<'_>) -> String {
        self.handle_and_notify(SYNC_PULL, "", &ctxt).await
    }

    async fn sync_push(&self, #[zbus(signal_context)] ctxt: zbus::SignalContext<'_>) -> String {
        self.handle_and_notify(SYNC_PUSH, "", &ctxt).await
    }

    async fn check_connection(&self) -> String {
        self.handle(CHECK_CONNECTION, "").await.to_json()
    }

    async fn get_stats(&self) -> String {
        self.handle(GET_STATS, "").await.to_json()
    }

    /// True while a sync operation is running
    #[zbus(property)]
    async fn syncing(&self) -> bool {
        self.handler.service().is_syncing()
    }

    /// Emitted when `sync-full`, `sync-pull` or `sync-push` finishes
    #[zbus(signal)]
    async fn sync_finished(
        signal_ctxt: &zbus::SignalContext<'_>,
        command: &str,
        success: bool,
    ) -> zbus::Result<()>;
}

// ============================================================================
// DbusService
// ============================================================================

/// Owns the interface objects and registers them on the session bus
pub struct DbusService {
    handler: CommandHandler,
}

impl DbusService {
    pub fn new(service: Arc<SyncService>) -> Self {
        Self {
            handler: CommandHandler::new(service),
        }
    }

    /// Starts the D-Bus service on the session bus
    ///
    /// Returns the connection, which must be kept alive for the service to
    /// remain reachable.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The session bus is not available
    /// - The well-known name is already owned (another instance running)
    pub async fn start(&self) -> anyhow::Result<zbus::Connection> {
        info!("Starting D-Bus service on session bus");

        let commands = SyncCommandsInterface::new(self.handler.clone());

        let connection = zbus::connection::Builder::session()?
            .name(DBUS_NAME)?
            .serve_at(DBUS_PATH, commands)?
            .build()
            .await?;

        info!(name = DBUS_NAME, path = DBUS_PATH, "D-Bus service started");

        Ok(connection)
    }

    /// Checks whether another process already owns [`DBUS_NAME`]
    ///
    /// Returns `false` if the name is taken.
    pub async fn try_acquire_name() -> anyhow::Result<bool> {
        let connection = zbus::Connection::session().await?;
        let dbus_proxy = zbus::fdo::DBusProxy::new(&connection).await?;

        Ok(dbus_proxy
            .get_name_owner(DBUS_NAME.try_into()?)
            .await
            .is_err())
    }
}
