//! Conflict detection logic
//!
//! Decides whether a remote change can be applied over the local row or
//! whether both sides changed it.

use tracing::{debug, info};

use possync_core::domain::{SyncConflict, PRIMARY_KEY_COLUMN};
use possync_core::ports::{LocalRecord, RecordChange};

/// Result of conflict detection check
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionResult {
    /// No conflict: safe to apply the remote change
    NoConflict,
    /// Conflict detected: both versions changed
    Conflicted(Box<SyncConflict>),
}

/// Detects conflicts between local and remote row versions
pub struct ConflictDetector;

impl ConflictDetector {
    /// Checks if a remote change conflicts with the local row
    ///
    /// A conflict exists when:
    /// 1. The local row exists and has edits that were never pushed, AND
    /// 2. The remote payload differs from the local row in at least one
    ///    of the columns it carries
    ///
    /// The returned conflict is not yet persisted. Its local snapshot is
    /// the current row, its remote snapshot the payload keyed by
    /// `record_id`, both without tracking columns.
    pub fn check_remote_change(
        existing: Option<&LocalRecord>,
        change: &RecordChange,
    ) -> DetectionResult {
        let Some(local) = existing else {
            return DetectionResult::NoConflict;
        };

        if !local.is_dirty() {
            return DetectionResult::NoConflict;
        }

        if !local.data.differs_from(&change.data) {
            debug!(
                table = %change.table_name,
                record_id = change.record_id,
                "Local edit already matches remote payload, no conflict"
            );
            return DetectionResult::NoConflict;
        }

        info!(
            table = %change.table_name,
            record_id = change.record_id,
            "Conflict detected: both local and remote versions changed"
        );

        let remote = change
            .data
            .without_tracking()
            .with(PRIMARY_KEY_COLUMN, change.record_id);

        DetectionResult::Conflicted(Box::new(SyncConflict::new(
            change.table_name.clone(),
            change.record_id,
            local.data.without_tracking(),
            remote,
        )))
    }
}
