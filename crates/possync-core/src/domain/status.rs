//! Read-side views: stats, connection probe result, watermarks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Dashboard numbers returned by `sync-get-stats`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Start of the most recent summary sync that ended in `success`
    pub last_sync: Option<DateTime<Utc>>,
    /// Dirty rows across all synchronized tables
    pub pending_changes: u64,
    pub unresolved_conflicts: u64,
    pub auto_sync_enabled: bool,
    /// Seconds
    pub sync_interval: u64,
}

/// Outcome of probing the remote status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_time: Option<DateTime<Utc>>,
}

impl ConnectionStatus {
    pub fn connected(server_time: Option<DateTime<Utc>>) -> Self {
        Self {
            connected: true,
            message: "Connected".to_string(),
            server_time,
        }
    }

    pub fn disconnected(message: impl Into<String>) -> Self {
        Self {
            connected: false,
            message: message.into(),
            server_time: None,
        }
    }
}

/// Replication watermarks, advanced only after confirmed success
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Local clock at the start of the last pull whose fetch succeeded
    pub last_pull_at: Option<DateTime<Utc>>,
    /// Opaque cursor echoed back to the remote as `since`
    pub pull_cursor: Option<String>,
    /// Local clock of the last fully acknowledged push
    pub last_push_at: Option<DateTime<Utc>>,
}
