//! Conflict domain entities
//!
//! A [`SyncConflict`] records that the same business row was edited locally
//! and remotely between two syncs. Both versions are kept as [`Record`]
//! snapshots until someone picks a side.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::ConflictId;
use super::record::Record;

/// Which snapshot wins when a conflict is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Keep the local row; it will be pushed on the next sync
    Local,
    /// Overwrite the local row with the remote version
    Remote,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Local => "local",
            Resolution::Remote => "remote",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Resolution::Local),
            "remote" => Ok(Resolution::Remote),
            _ => Err(DomainError::InvalidValue {
                field: "resolution",
                value: s.to_string(),
            }),
        }
    }
}

/// A divergence between the local and remote versions of one row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Assigned by the database on insert
    id: Option<ConflictId>,
    table_name: String,
    record_id: i64,
    local_data: Record,
    remote_data: Record,
    resolved: bool,
    resolution: Option<Resolution>,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl SyncConflict {
    /// Creates a new unresolved conflict
    ///
    /// # Arguments
    ///
    /// * `table_name` - Business table holding the row
    /// * `record_id` - Primary key of the row
    /// * `local_data` - Local row as it was when the remote change arrived
    /// * `remote_data` - Incoming remote payload
    pub fn new(
        table_name: impl Into<String>,
        record_id: i64,
        local_data: Record,
        remote_data: Record,
    ) -> Self {
        Self {
            id: None,
            table_name: table_name.into(),
            record_id,
            local_data,
            remote_data,
            resolved: false,
            resolution: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn id(&self) -> Option<ConflictId> {
        self.id
    }

    pub fn with_id(mut self, id: ConflictId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn record_id(&self) -> i64 {
        self.record_id
    }

    pub fn local_data(&self) -> &Record {
        &self.local_data
    }

    pub fn remote_data(&self) -> &Record {
        &self.remote_data
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    /// The snapshot that `resolution` selects
    pub fn snapshot(&self, resolution: Resolution) -> &Record {
        match resolution {
            Resolution::Local => &self.local_data,
            Resolution::Remote => &self.remote_data,
        }
    }

    /// Marks the conflict resolved
    ///
    /// Resolving is one-way: calling this on an already-resolved conflict
    /// returns it unchanged.
    pub fn resolve(mut self, resolution: Resolution, resolved_at: DateTime<Utc>) -> Self {
        if self.resolved {
            return self;
        }
        self.resolved = true;
        self.resolution = Some(resolution);
        self.resolved_at = Some(resolved_at);
        self
    }
}
