//! SyncLogger - high-level sync log service
//!
//! Wraps the `ISyncStore` log methods with one call per kind of event. All
//! methods are non-fatal: errors in log persistence are logged via
//! `tracing::warn!` but never propagated.

use std::sync::Arc;

use possync_core::{
    domain::{newtypes::LogEntryId, SyncLogEntry, SyncStatus, SyncType},
    ports::ISyncStore,
};

/// Operation name of the per-record event written for a detected conflict
pub const CONFLICT_OPERATION: &str = "conflict";

/// Operation name of the per-record event written for a failed apply
pub const APPLY_OPERATION: &str = "apply";

/// High-level logger over the store's `sync_log` table.
///
/// All methods silently swallow errors (logging a warning) so that log
/// failures never break sync operations.
pub struct SyncLogger {
    store: Arc<dyn ISyncStore>,
}

impl SyncLogger {
    /// Creates a new `SyncLogger` backed by the given store.
    pub fn new(store: Arc<dyn ISyncStore>) -> Self {
        Self { store }
    }

    /// Persist a log entry, swallowing errors with a tracing warning.
    async fn save(&self, entry: &SyncLogEntry) -> Option<LogEntryId> {
        match self.store.insert_log(entry).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, operation = entry.operation(), "Failed to save sync log entry");
                None
            }
        }
    }

    // ========================================================================
    // Summary entries
    // ========================================================================

    /// Open an `in_progress` summary entry covering all tables.
    ///
    /// Returns `None` if the entry could not be written.
    pub async fn begin(&self, sync_type: SyncType, operation: &str) -> Option<LogEntryId> {
        self.save(&SyncLogEntry::new(sync_type, operation)).await
    }

    /// Move a summary entry to its terminal status.
    ///
    /// A `None` id (the entry was never written) is ignored.
    pub async fn finish(&self, id: Option<LogEntryId>, status: SyncStatus, message: Option<&str>) {
        let Some(id) = id else {
            return;
        };
        match self.store.finish_log(id, status, message).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(log_id = %id, "Sync log entry was already finished");
            }
            Err(e) => {
                tracing::warn!(error = %e, log_id = %id, "Failed to finish sync log entry");
            }
        }
    }

    /// Write a summary entry that failed before any work started.
    pub async fn record_failure(&self, sync_type: SyncType, operation: &str, message: &str) {
        let entry = SyncLogEntry::new(sync_type, operation).with_error(message);
        self.save(&entry).await;
    }

    // ========================================================================
    // Per-record events
    // ========================================================================

    /// Log detection of a conflict on one row.
    pub async fn record_conflict(&self, sync_type: SyncType, table: &str, record_id: i64) {
        let entry = SyncLogEntry::new(sync_type, CONFLICT_OPERATION)
            .with_table(table)
            .with_status(SyncStatus::Conflict)
            .with_message(format!("record {}: local and remote versions differ", record_id));
        self.save(&entry).await;
    }

    /// Log a remote change that could not be applied.
    pub async fn record_apply_error(
        &self,
        sync_type: SyncType,
        table: &str,
        record_id: i64,
        message: &str,
    ) {
        let entry = SyncLogEntry::new(sync_type, APPLY_OPERATION)
            .with_table(table)
            .with_error(format!("record {}: {}", record_id, message));
        self.save(&entry).await;
    }
}
