//! possync IPC - Command layer for UI clients
//!
//! The POS front end talks to the sync engine through eleven named
//! commands, each taking a JSON object and answering with
//! `{success, data?, error?}`.
//!
//! - [`commands`] - Parses arguments and dispatches to `SyncService`
//! - [`service`] - Exports the commands on the D-Bus session bus
//!   (`com.possync.Sync`)

pub mod commands;
pub mod service;

pub use commands::{CommandHandler, CommandResponse, COMMANDS};
pub use service::{DbusService, DBUS_NAME, DBUS_PATH};
