//! Pulls racing with edits made at the till
//!
//! `TillStore` wraps the real store and runs one statement against
//! `products#1` right after the engine has read it, the way the POS UI can
//! between read and write.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use wiremock::MockServer;

use possync_cache::SqliteSyncStore;
use possync_core::{
    domain::{
        newtypes::{ConflictId, LogEntryId, TableName},
        Record, Resolution, SyncConfig, SyncConflict, SyncLogEntry, SyncState, SyncStatus,
    },
    ports::{ISyncStore, LocalRecord},
};
use possync_sync::SyncService;

use crate::common::{self, product, product_change};

const TILL_EDIT_AT: &str = "2026-03-01T11:30:00.000Z";

const RENAME: &str = "UPDATE products SET name = 'Till edit', updated_at = ? WHERE id = 1";
const CREATE: &str = "INSERT INTO products (id, name, price, updated_at, synced_at) \
                      VALUES (1, 'Till edit', 1.0, ?, NULL)";

struct TillStore {
    inner: Arc<SqliteSyncStore>,
    edit: &'static str,
    edited: AtomicBool,
}

impl TillStore {
    async fn edit_once(&self, table: &TableName, record_id: i64) -> Result<()> {
        if table.as_str() != "products" || record_id != 1 || self.edited.swap(true, Ordering::SeqCst)
        {
            return Ok(());
        }
        sqlx::query(self.edit)
            .bind(TILL_EDIT_AT)
            .execute(self.inner.pool())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ISyncStore for TillStore {
    async fn get_config(&self) -> Result<Option<SyncConfig>> {
        self.inner.get_config().await
    }
    async fn save_config(&self, config: &SyncConfig) -> Result<()> {
        self.inner.save_config(config).await
    }
    async fn get_state(&self) -> Result<SyncState> {
        self.inner.get_state().await
    }
    async fn record_pull(&self, pulled_at: DateTime<Utc>, cursor: Option<&str>) -> Result<()> {
        self.inner.record_pull(pulled_at, cursor).await
    }
    async fn record_push(&self, pushed_at: DateTime<Utc>) -> Result<()> {
        self.inner.record_push(pushed_at).await
    }
    async fn insert_log(&self, entry: &SyncLogEntry) -> Result<LogEntryId> {
        self.inner.insert_log(entry).await
    }
    async fn finish_log(
        &self,
        id: LogEntryId,
        status: SyncStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        self.inner.finish_log(id, status, error_message).await
    }
    async fn recent_log(&self, limit: u32) -> Result<Vec<SyncLogEntry>> {
        self.inner.recent_log(limit).await
    }
    async fn delete_log_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.inner.delete_log_before(cutoff).await
    }
    async fn last_completed_sync(&self) -> Result<Option<DateTime<Utc>>> {
        self.inner.last_completed_sync().await
    }
    async fn insert_conflict(&self, conflict: &SyncConflict) -> Result<ConflictId> {
        self.inner.insert_conflict(conflict).await
    }
    async fn get_conflict(&self, id: ConflictId) -> Result<Option<SyncConflict>> {
        self.inner.get_conflict(id).await
    }
    async fn list_conflicts(&self, include_resolved: bool) -> Result<Vec<SyncConflict>> {
        self.inner.list_conflicts(include_resolved).await
    }
    async fn has_unresolved_conflict(&self, table: &TableName, record_id: i64) -> Result<bool> {
        self.inner.has_unresolved_conflict(table, record_id).await
    }
    async fn count_unresolved_conflicts(&self) -> Result<u64> {
        self.inner.count_unresolved_conflicts().await
    }
    async fn apply_resolution(
        &self,
        conflict: &SyncConflict,
        resolution: Resolution,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.inner
            .apply_resolution(conflict, resolution, resolved_at)
            .await
    }
    async fn table_exists(&self, table: &TableName) -> Result<bool> {
        self.inner.table_exists(table).await
    }
    async fn get_record(&self, table: &TableName, record_id: i64) -> Result<Option<LocalRecord>> {
        let row = self.inner.get_record(table, record_id).await?;
        self.edit_once(table, record_id).await?;
        Ok(row)
    }
    async fn apply_remote(
        &self,
        table: &TableName,
        record_id: i64,
        data: &Record,
        expected: Option<&LocalRecord>,
        applied_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.inner
            .apply_remote(table, record_id, data, expected, applied_at)
            .await
    }
    async fn dirty_records(&self, table: &TableName) -> Result<Vec<LocalRecord>> {
        self.inner.dirty_records(table).await
    }
    async fn count_dirty(&self, table: &TableName) -> Result<u64> {
        self.inner.count_dirty(table).await
    }
    async fn mark_synced(&self, records: &[LocalRecord]) -> Result<u64> {
        self.inner.mark_synced(records).await
    }
}

/// Configured service whose store runs `edit` after the first read of
/// `products#1`
async fn till_harness(edit: &'static str) -> (MockServer, Arc<SqliteSyncStore>, SyncService) {
    let server = MockServer::start().await;
    let store = common::products_store().await;
    let till = Arc::new(TillStore {
        inner: Arc::clone(&store),
        edit,
        edited: AtomicBool::new(false),
    });
    let service = SyncService::new(till, common::http_remote(), common::settings());
    common::configure(&service, &server).await;
    (server, store, service)
}

#[tokio::test]
async fn test_edit_between_read_and_apply_becomes_conflict() {
    let (server, store, service) = till_harness(RENAME).await;
    common::insert_clean_product(&store, 1, "Tea").await;
    common::mount_status(&server).await;
    common::mount_pull(&server, vec![product_change(1, "Remote", 2.0)], 1).await;

    let summary = service.sync_pull().await.expect("pull");
    assert_eq!(summary.applied_changes, 0);
    assert_eq!(summary.conflicts, 1);
    assert!(summary.errors.is_empty());

    let row = product(&store, 1).await.unwrap();
    assert_eq!(row.data.get("name"), Some(&json!("Till edit")));
    assert!(row.is_dirty());

    let conflicts = service.get_conflicts(false).await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].local_data().get("name"), Some(&json!("Till edit")));
    assert_eq!(conflicts[0].remote_data().get("name"), Some(&json!("Remote")));
}

#[tokio::test]
async fn test_row_created_between_read_and_apply_is_kept() {
    let (server, store, service) = till_harness(CREATE).await;
    common::mount_status(&server).await;
    common::mount_pull(&server, vec![product_change(1, "Remote", 2.0)], 1).await;

    let summary = service.sync_pull().await.expect("pull");
    assert_eq!(summary.applied_changes, 0);
    assert_eq!(summary.conflicts, 1);

    let row = product(&store, 1).await.unwrap();
    assert_eq!(row.data.get("name"), Some(&json!("Till edit")));
    assert!(row.is_dirty());
}

#[tokio::test]
async fn test_untouched_row_is_still_applied() {
    let (server, store, service) = till_harness(RENAME).await;
    common::insert_clean_product(&store, 2, "Mate").await;
    common::mount_status(&server).await;
    common::mount_pull(&server, vec![product_change(2, "Yerba Mate", 4.0)], 1).await;

    let summary = service.sync_pull().await.expect("pull");
    assert_eq!(summary.applied_changes, 1);
    assert_eq!(summary.conflicts, 0);

    let row = product(&store, 2).await.unwrap();
    assert_eq!(row.data.get("name"), Some(&json!("Yerba Mate")));
    assert!(!row.is_dirty());
}
