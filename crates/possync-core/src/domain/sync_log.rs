//! Sync log domain entities
//!
//! Every sync attempt leaves a [`SyncLogEntry`] behind. Summary entries are
//! opened as `in_progress` and closed with a terminal status; per-record
//! events (apply failures, detected conflicts) are written already terminal.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::LogEntryId;

/// Which engine(s) a log entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    /// Pull followed by push
    Full,
    Pull,
    Push,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncType::Full => "full",
            SyncType::Pull => "pull",
            SyncType::Push => "push",
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(SyncType::Full),
            "pull" => Ok(SyncType::Pull),
            "push" => Ok(SyncType::Push),
            other => Err(DomainError::InvalidValue {
                field: "sync_type",
                value: other.to_string(),
            }),
        }
    }
}

/// Outcome recorded on a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Error,
    /// Completed, but at least one conflict was recorded
    Conflict,
    /// Started and not yet finished (or the process died mid-sync)
    InProgress,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
            SyncStatus::Conflict => "conflict",
            SyncStatus::InProgress => "in_progress",
        }
    }

    /// Terminal statuses are never changed once written
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncStatus::InProgress)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(SyncStatus::Success),
            "error" => Ok(SyncStatus::Error),
            "conflict" => Ok(SyncStatus::Conflict),
            "in_progress" => Ok(SyncStatus::InProgress),
            other => Err(DomainError::InvalidValue {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// One row of `sync_log`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Assigned by the database on insert
    id: Option<LogEntryId>,
    sync_type: SyncType,
    /// `None` means the entry covers all tables
    table_name: Option<String>,
    operation: String,
    status: SyncStatus,
    error_message: Option<String>,
    started_at: DateTime<Utc>,
}

impl SyncLogEntry {
    /// Creates an `in_progress` entry stamped with the current time
    ///
    /// # Example
    ///
    /// ```
    /// use possync_core::domain::sync_log::{SyncLogEntry, SyncStatus, SyncType};
    ///
    /// let entry = SyncLogEntry::new(SyncType::Pull, "pull");
    /// assert_eq!(entry.status(), SyncStatus::InProgress);
    /// assert!(entry.table_name().is_none());
    /// ```
    pub fn new(sync_type: SyncType, operation: impl Into<String>) -> Self {
        Self {
            id: None,
            sync_type,
            table_name: None,
            operation: operation.into(),
            status: SyncStatus::InProgress,
            error_message: None,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Option<LogEntryId> {
        self.id
    }

    pub fn with_id(mut self, id: LogEntryId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn sync_type(&self) -> SyncType {
        self.sync_type
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    /// Scopes the entry to a single table
    pub fn with_table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn with_status(mut self, status: SyncStatus) -> Self {
        self.status = status;
        self
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Marks the entry as failed with `message`
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.status = SyncStatus::Error;
        self.error_message = Some(message.into());
        self
    }

    /// Attaches a message without changing the status (conflict details)
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }
}
