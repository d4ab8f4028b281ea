//! Domain entities and business logic
//!
//! This module contains the core domain types for possync:
//! - Newtypes for row ids and validated table names
//! - The generic [`Record`] used for business rows and conflict snapshots
//! - Sync endpoint configuration, log entries, conflicts
//! - Read-side views (stats, connection status, watermarks)
//! - Domain-specific error types

pub mod conflict;
pub mod errors;
pub mod newtypes;
pub mod record;
pub mod status;
pub mod sync_config;
pub mod sync_log;

// Re-export commonly used types
pub use conflict::{Resolution, SyncConflict};
pub use errors::DomainError;
pub use newtypes::*;
pub use record::{format_timestamp, parse_timestamp, Record, PRIMARY_KEY_COLUMN, TRACKING_COLUMNS};
pub use status::{ConnectionStatus, SyncState, SyncStats};
pub use sync_config::{SyncConfig, SyncConfigUpdate};
pub use sync_log::{SyncLogEntry, SyncStatus, SyncType};
