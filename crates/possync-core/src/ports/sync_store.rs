//! Sync store port (driven/secondary port)
//!
//! Interface to the local database: the sync metadata tables plus generic
//! access to the synchronized business tables.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific and
//!   the engines only need to know that a write failed.
//! - Operations that must be atomic (`apply_remote`, `mark_synced`,
//!   `apply_resolution`) are single port calls so the adapter can wrap each
//!   in one transaction.
//! - Business rows are addressed by `(TableName, i64)`; the adapter is
//!   responsible for the `updated_at` / `synced_at` tracking columns.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    newtypes::{ConflictId, LogEntryId, TableName},
    record::Record,
    Resolution, SyncConfig, SyncConflict, SyncLogEntry, SyncState, SyncStatus,
};

/// A business row as the engine sees it
#[derive(Debug, Clone, PartialEq)]
pub struct LocalRecord {
    pub table_name: TableName,
    pub record_id: i64,
    /// Data columns, primary key included, tracking columns excluded
    pub data: Record,
    /// Raw `updated_at` text as stored
    pub updated_at: Option<String>,
    /// Raw `synced_at` text as stored
    pub synced_at: Option<String>,
}

impl LocalRecord {
    /// True when the row has local edits that were never pushed
    pub fn is_dirty(&self) -> bool {
        match (&self.synced_at, &self.updated_at) {
            (None, _) => true,
            (Some(synced), Some(updated)) => synced != updated,
            (Some(_), None) => false,
        }
    }
}

/// Port for local persistence
#[async_trait]
pub trait ISyncStore: Send + Sync {
    // ------------------------------------------------------------------
    // Configuration and watermarks
    // ------------------------------------------------------------------

    /// Loads the singleton sync configuration, `None` before first setup
    async fn get_config(&self) -> Result<Option<SyncConfig>>;

    /// Creates or replaces the singleton sync configuration
    async fn save_config(&self, config: &SyncConfig) -> Result<()>;

    /// Loads the replication watermarks
    async fn get_state(&self) -> Result<SyncState>;

    /// Advances the pull watermark and remote cursor
    async fn record_pull(&self, pulled_at: DateTime<Utc>, cursor: Option<&str>) -> Result<()>;

    /// Advances the push watermark
    async fn record_push(&self, pushed_at: DateTime<Utc>) -> Result<()>;

    // ------------------------------------------------------------------
    // Sync log
    // ------------------------------------------------------------------

    /// Appends an entry and returns its id
    async fn insert_log(&self, entry: &SyncLogEntry) -> Result<LogEntryId>;

    /// Moves an `in_progress` entry to a terminal status
    ///
    /// Returns false if the entry does not exist or is already terminal.
    async fn finish_log(
        &self,
        id: LogEntryId,
        status: SyncStatus,
        error_message: Option<&str>,
    ) -> Result<bool>;

    /// Most recent entries, newest first
    async fn recent_log(&self, limit: u32) -> Result<Vec<SyncLogEntry>>;

    /// Deletes entries started before `cutoff`, returning how many were removed
    async fn delete_log_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Start time of the newest all-tables entry that ended in `success`
    async fn last_completed_sync(&self) -> Result<Option<DateTime<Utc>>>;

    // ------------------------------------------------------------------
    // Conflicts
    // ------------------------------------------------------------------

    /// Persists a new unresolved conflict
    async fn insert_conflict(&self, conflict: &SyncConflict) -> Result<ConflictId>;

    async fn get_conflict(&self, id: ConflictId) -> Result<Option<SyncConflict>>;

    /// Conflicts newest first; resolved ones only when asked for
    async fn list_conflicts(&self, include_resolved: bool) -> Result<Vec<SyncConflict>>;

    async fn has_unresolved_conflict(&self, table: &TableName, record_id: i64) -> Result<bool>;

    async fn count_unresolved_conflicts(&self) -> Result<u64>;

    /// Writes the chosen snapshot to the business row and closes the conflict
    ///
    /// Both writes happen in one transaction. Returns false (and writes
    /// nothing) if the conflict was no longer unresolved.
    async fn apply_resolution(
        &self,
        conflict: &SyncConflict,
        resolution: Resolution,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool>;

    // ------------------------------------------------------------------
    // Business rows
    // ------------------------------------------------------------------

    /// Returns true if `table` exists in the local database
    async fn table_exists(&self, table: &TableName) -> Result<bool>;

    async fn get_record(&self, table: &TableName, record_id: i64) -> Result<Option<LocalRecord>>;

    /// Upserts a remote row and marks it clean, unless the row moved on
    ///
    /// `expected` is the version the caller based its decision on, `None`
    /// if the row was absent. The write is a single guarded statement: it
    /// happens only if the stored row still carries the same `updated_at`
    /// and `synced_at` (or is still absent). Returns false, writing
    /// nothing, when the row changed in between.
    ///
    /// Columns unknown to the local table are dropped.
    async fn apply_remote(
        &self,
        table: &TableName,
        record_id: i64,
        data: &Record,
        expected: Option<&LocalRecord>,
        applied_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Rows of `table` with unpushed edits
    async fn dirty_records(&self, table: &TableName) -> Result<Vec<LocalRecord>>;

    async fn count_dirty(&self, table: &TableName) -> Result<u64>;

    /// Marks pushed rows clean, in one transaction
    ///
    /// Rows edited again after they were read stay dirty. Returns the
    /// number of rows marked.
    async fn mark_synced(&self, records: &[LocalRecord]) -> Result<u64>;
}
