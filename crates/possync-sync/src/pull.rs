//! Pull engine
//!
//! Downloads remote changes and applies them row by row:
//!
//! 1. A row with an open conflict is left alone until someone resolves it.
//! 2. Rows of tables outside `sync.tables` are skipped.
//! 3. Absent, clean, or already-equal rows are upserted and marked clean.
//! 4. Anything else becomes a `SyncConflict`; the row is not touched.
//!
//! When a batch carries several versions of one row only the newest is
//! applied. The upsert is guarded by the row version the decision was made
//! on; if the till edits the row in between, the decision is taken again.
//!
//! Each apply is its own transaction. A failing row is logged and the batch
//! continues. Watermarks move only after the fetch itself succeeded.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use possync_audit::SyncLogger;
use possync_conflict::{ConflictDetector, DetectionResult};
use possync_core::{
    domain::{format_timestamp, newtypes::TableName, SyncStatus, SyncType},
    ports::{ISyncStore, IRemoteService, RecordChange, RemoteEndpoint},
};

use crate::SyncError;

/// Reads and decisions per change before giving up on a row that keeps
/// changing under the pull
const MAX_APPLY_ATTEMPTS: usize = 3;

/// Counters for one pull
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PullSummary {
    pub applied_changes: u32,
    pub conflicts: u32,
    pub skipped: u32,
    /// One message per change that could not be applied
    pub errors: Vec<String>,
}

impl PullSummary {
    /// `conflict` when any conflict was recorded, `success` otherwise
    pub fn status(&self) -> SyncStatus {
        if self.conflicts > 0 {
            SyncStatus::Conflict
        } else {
            SyncStatus::Success
        }
    }
}

/// What happened to one incoming change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Applied,
    Conflict,
    Skipped,
}

pub struct PullEngine {
    store: Arc<dyn ISyncStore>,
    remote: Arc<dyn IRemoteService>,
    logger: Arc<SyncLogger>,
    tables: Vec<TableName>,
}

impl PullEngine {
    pub fn new(
        store: Arc<dyn ISyncStore>,
        remote: Arc<dyn IRemoteService>,
        logger: Arc<SyncLogger>,
        tables: Vec<TableName>,
    ) -> Self {
        Self {
            store,
            remote,
            logger,
            tables,
        }
    }

    /// Runs one pull cycle
    ///
    /// `sync_type` tags the per-record log events (`pull` or `full`).
    ///
    /// # Errors
    ///
    /// Fails only if the fetch fails or the watermarks cannot be read or
    /// written. Per-record failures are reported in [`PullSummary::errors`].
    #[tracing::instrument(skip(self, endpoint), fields(empresa_id = endpoint.empresa_id))]
    pub async fn run(
        &self,
        endpoint: &RemoteEndpoint,
        sync_type: SyncType,
    ) -> Result<PullSummary, SyncError> {
        let cycle_start = Utc::now();
        let state = self.store.get_state().await?;

        let page = self
            .remote
            .pull(endpoint, state.pull_cursor.as_deref())
            .await?;

        info!(
            changes = page.changes.len(),
            since = ?state.pull_cursor,
            "Remote changes fetched"
        );

        let mut summary = PullSummary::default();
        let winners = latest_per_key(&page.changes);
        let mut newest: Option<DateTime<Utc>> = None;

        for (index, change) in page.changes.iter().enumerate() {
            if let Some(ts) = change.updated_at {
                newest = Some(newest.map_or(ts, |n| n.max(ts)));
            }

            let key = (change.table_name.as_str(), change.record_id);
            if winners.get(&key) != Some(&index) {
                debug!(
                    table = %change.table_name,
                    record_id = change.record_id,
                    "Superseded by a newer change in the same batch, skipping"
                );
                summary.skipped += 1;
                continue;
            }

            match self.process(change, cycle_start, sync_type).await {
                Ok(Outcome::Applied) => summary.applied_changes += 1,
                Ok(Outcome::Conflict) => summary.conflicts += 1,
                Ok(Outcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    let message = format!("{:#}", e);
                    warn!(
                        table = %change.table_name,
                        record_id = change.record_id,
                        error = %message,
                        "Failed to apply remote change"
                    );
                    self.logger
                        .record_apply_error(
                            sync_type,
                            &change.table_name,
                            change.record_id,
                            &message,
                        )
                        .await;
                    summary
                        .errors
                        .push(format!("{}#{}: {}", change.table_name, change.record_id, message));
                }
            }
        }

        let cursor = page.server_time.or(newest).map(format_timestamp);
        self.store
            .record_pull(cycle_start, cursor.as_deref())
            .await?;

        info!(
            applied = summary.applied_changes,
            conflicts = summary.conflicts,
            skipped = summary.skipped,
            errors = summary.errors.len(),
            "Pull complete"
        );

        Ok(summary)
    }

    async fn process(
        &self,
        change: &RecordChange,
        cycle_start: DateTime<Utc>,
        sync_type: SyncType,
    ) -> anyhow::Result<Outcome> {
        let table = TableName::new(change.table_name.as_str())?;

        if self
            .store
            .has_unresolved_conflict(&table, change.record_id)
            .await?
        {
            debug!(
                table = %table,
                record_id = change.record_id,
                "Row has an open conflict, skipping"
            );
            return Ok(Outcome::Skipped);
        }

        if !self.tables.contains(&table) {
            warn!(table = %table, "Change for a table that is not synchronized, skipping");
            return Ok(Outcome::Skipped);
        }

        for attempt in 1..=MAX_APPLY_ATTEMPTS {
            let existing = self.store.get_record(&table, change.record_id).await?;

            match ConflictDetector::check_remote_change(existing.as_ref(), change) {
                DetectionResult::NoConflict => {
                    let applied = self
                        .store
                        .apply_remote(
                            &table,
                            change.record_id,
                            &change.data,
                            existing.as_ref(),
                            cycle_start,
                        )
                        .await?;
                    if applied {
                        return Ok(Outcome::Applied);
                    }
                    debug!(
                        table = %table,
                        record_id = change.record_id,
                        attempt,
                        "Row changed locally during apply, checking again"
                    );
                }
                DetectionResult::Conflicted(conflict) => {
                    self.store.insert_conflict(&conflict).await?;
                    self.logger
                        .record_conflict(sync_type, table.as_str(), change.record_id)
                        .await;
                    return Ok(Outcome::Conflict);
                }
            }
        }

        anyhow::bail!(
            "row kept changing locally, not applied after {} attempts",
            MAX_APPLY_ATTEMPTS
        )
    }
}

/// Position of the change to apply for every `(table, record_id)` in a batch
///
/// The greatest `updated_at` wins. On equal or missing timestamps the later
/// position in the batch wins.
fn latest_per_key(changes: &[RecordChange]) -> HashMap<(&str, i64), usize> {
    let mut winners: HashMap<(&str, i64), usize> = HashMap::new();
    for (index, change) in changes.iter().enumerate() {
        let key = (change.table_name.as_str(), change.record_id);
        winners
            .entry(key)
            .and_modify(|current| {
                let supersedes = match (changes[*current].updated_at, change.updated_at) {
                    (Some(kept), Some(incoming)) => incoming >= kept,
                    _ => true,
                };
                if supersedes {
                    *current = index;
                }
            })
            .or_insert(index);
    }
    winners
}
