//! Pull engine behavior through `sync_pull`

use serde_json::json;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, ResponseTemplate};

use possync_core::{
    domain::{SyncStatus, SyncType},
    ports::ISyncStore,
};
use possync_sync::orchestrator::PULL_OPERATION;
use possync_sync::SyncErrorKind;

use crate::common::{self, product, product_change};

#[tokio::test]
async fn test_empty_change_set_is_success() {
    let h = common::harness().await;
    common::mount_status(&h.server).await;
    common::mount_pull(&h.server, vec![], 1).await;

    let summary = h.service.sync_pull().await.expect("pull");
    assert_eq!(summary.sync_type, SyncType::Pull);
    assert_eq!(summary.applied_changes, 0);
    assert_eq!(summary.conflicts, 0);
    assert_eq!(summary.status, SyncStatus::Success);

    let log = h.service.get_log(None).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].operation(), PULL_OPERATION);
    assert_eq!(log[0].status(), SyncStatus::Success);
}

#[tokio::test]
async fn test_clean_row_is_overwritten_once() {
    let h = common::harness().await;
    common::insert_clean_product(&h.store, 1, "Tea").await;
    common::mount_status(&h.server).await;
    common::mount_pull(&h.server, vec![product_change(1, "Green Tea", 3.5)], 1).await;

    let summary = h.service.sync_pull().await.expect("pull");
    assert_eq!(summary.applied_changes, 1);
    assert_eq!(summary.conflicts, 0);

    let row = product(&h.store, 1).await.unwrap();
    assert_eq!(row.data.get("name"), Some(&json!("Green Tea")));
    assert_eq!(row.data.get("price"), Some(&json!(3.5)));
    assert!(!row.is_dirty());
    assert_eq!(h.store.count_unresolved_conflicts().await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_row_is_inserted_clean() {
    let h = common::harness().await;
    common::mount_status(&h.server).await;
    common::mount_pull(&h.server, vec![product_change(5, "Mate", 4.0)], 1).await;

    h.service.sync_pull().await.expect("pull");

    let row = product(&h.store, 5).await.expect("row inserted");
    assert_eq!(row.data.get("name"), Some(&json!("Mate")));
    assert!(!row.is_dirty());
}

#[tokio::test]
async fn test_locally_edited_row_becomes_conflict() {
    let h = common::harness().await;
    common::insert_edited_product(&h.store, 42, "Local Name").await;
    common::mount_status(&h.server).await;
    common::mount_pull(&h.server, vec![product_change(42, "Remote Name", 9.0)], 1).await;

    let before = h.service.get_stats().await.unwrap().unresolved_conflicts;
    let summary = h.service.sync_pull().await.expect("pull");
    assert_eq!(summary.conflicts, 1);
    assert_eq!(summary.applied_changes, 0);
    assert_eq!(summary.status, SyncStatus::Conflict);

    let conflicts = h.service.get_conflicts(false).await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].table_name(), "products");
    assert_eq!(conflicts[0].record_id(), 42);
    assert_eq!(conflicts[0].local_data().get("name"), Some(&json!("Local Name")));
    assert_eq!(conflicts[0].remote_data().get("name"), Some(&json!("Remote Name")));

    let row = product(&h.store, 42).await.unwrap();
    assert_eq!(row.data.get("name"), Some(&json!("Local Name")));
    assert_eq!(row.updated_at.as_deref(), Some(common::T1));

    let stats = h.service.get_stats().await.unwrap();
    assert_eq!(stats.unresolved_conflicts, before + 1);
    // A run that ended in conflict is not a completed sync
    assert!(stats.last_sync.is_none());
}

#[tokio::test]
async fn test_edited_row_equal_to_remote_is_applied() {
    let h = common::harness().await;
    common::insert_edited_product(&h.store, 3, "Same").await;
    common::mount_status(&h.server).await;

    common::mount_pull(&h.server, vec![product_change(3, "Same", 1.0)], 1).await;

    let summary = h.service.sync_pull().await.expect("pull");
    assert_eq!(summary.applied_changes, 1);
    assert_eq!(summary.conflicts, 0);
    assert!(!product(&h.store, 3).await.unwrap().is_dirty());
}

#[tokio::test]
async fn test_repeated_pull_is_idempotent() {
    let h = common::harness().await;
    common::insert_clean_product(&h.store, 1, "Tea").await;
    common::mount_status(&h.server).await;
    common::mount_pull(&h.server, vec![product_change(1, "Green Tea", 3.5)], 2).await;

    h.service.sync_pull().await.expect("first pull");
    let first = product(&h.store, 1).await.unwrap();

    let second_summary = h.service.sync_pull().await.expect("second pull");
    assert_eq!(second_summary.conflicts, 0);

    let second = product(&h.store, 1).await.unwrap();
    assert_eq!(first.data, second.data);
    assert!(!second.is_dirty());
    assert_eq!(h.store.count_unresolved_conflicts().await.unwrap(), 0);
}

#[tokio::test]
async fn test_open_conflict_blocks_further_overwrites() {
    let h = common::harness().await;
    common::insert_edited_product(&h.store, 42, "Local Name").await;
    common::mount_status(&h.server).await;
    common::mount_pull(&h.server, vec![product_change(42, "Remote Name", 9.0)], 2).await;

    h.service.sync_pull().await.expect("first pull");
    let summary = h.service.sync_pull().await.expect("second pull");

    assert_eq!(summary.conflicts, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(h.store.count_unresolved_conflicts().await.unwrap(), 1);
}

#[tokio::test]
async fn test_duplicate_and_foreign_changes_are_skipped() {
    let h = common::harness().await;
    common::mount_status(&h.server).await;
    common::mount_pull(
        &h.server,
        vec![
            product_change(1, "First", 1.0),
            product_change(1, "Second", 2.0),
            json!({
                "table_name": "clients",
                "record_id": 9,
                "data": {"id": 9, "name": "ACME"}
            }),
        ],
        1,
    )
    .await;

    let summary = h.service.sync_pull().await.expect("pull");
    assert_eq!(summary.applied_changes, 1);
    assert_eq!(summary.skipped, 2);

    // Same timestamp on both versions, so the later one in the batch wins
    let row = product(&h.store, 1).await.unwrap();
    assert_eq!(row.data.get("name"), Some(&json!("Second")));
}

fn versioned_change(name: &str, updated_at: &str) -> serde_json::Value {
    json!({
        "table_name": "products",
        "record_id": 1,
        "data": {"id": 1, "name": name, "price": 1.0},
        "updated_at": updated_at
    })
}

#[tokio::test]
async fn test_newest_version_in_batch_is_applied() {
    let h = common::harness().await;
    common::insert_clean_product(&h.store, 1, "Tea").await;
    common::mount_status(&h.server).await;
    common::mount_pull(
        &h.server,
        vec![
            versioned_change("v1", "2026-03-01T10:00:00Z"),
            versioned_change("v2", "2026-03-01T11:00:00Z"),
        ],
        1,
    )
    .await;

    let summary = h.service.sync_pull().await.expect("pull");
    assert_eq!(summary.applied_changes, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.conflicts, 0);

    let row = product(&h.store, 1).await.unwrap();
    assert_eq!(row.data.get("name"), Some(&json!("v2")));
    assert!(!row.is_dirty());
}

#[tokio::test]
async fn test_newest_version_wins_when_listed_first() {
    let h = common::harness().await;
    common::mount_status(&h.server).await;
    common::mount_pull(
        &h.server,
        vec![
            versioned_change("v2", "2026-03-01T11:00:00Z"),
            versioned_change("v1", "2026-03-01T10:00:00Z"),
        ],
        1,
    )
    .await;

    let summary = h.service.sync_pull().await.expect("pull");
    assert_eq!(summary.applied_changes, 1);
    assert_eq!(summary.skipped, 1);

    let row = product(&h.store, 1).await.unwrap();
    assert_eq!(row.data.get("name"), Some(&json!("v2")));
}

#[tokio::test]
async fn test_failing_row_does_not_abort_batch() {
    let h = common::harness().await;
    common::mount_status(&h.server).await;
    common::mount_pull(
        &h.server,
        vec![
            json!({
                "table_name": "products",
                "record_id": 77,
                "data": {"id": 77, "name": null}
            }),
            product_change(2, "Coffee", 6.0),
        ],
        1,
    )
    .await;

    let summary = h.service.sync_pull().await.expect("pull");
    assert_eq!(summary.applied_changes, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].starts_with("products#77:"));
    assert!(product(&h.store, 77).await.is_none());
    assert!(product(&h.store, 2).await.is_some());

    let log = h.service.get_log(None).await.unwrap();
    assert!(log
        .iter()
        .any(|e| e.operation() == "apply" && e.status() == SyncStatus::Error));
}

#[tokio::test]
async fn test_cursor_is_sent_on_next_pull() {
    let h = common::harness().await;
    common::mount_status(&h.server).await;

    Mock::given(method("GET"))
        .and(path("/api/sync/pull"))
        .and(query_param("empresa_id", "7"))
        .and(query_param_is_missing("since"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "changes": [],
            "server_time": "2026-03-01T12:00:00Z"
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&h.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/sync/pull"))
        .and(query_param("since", "2026-03-01T12:00:00.000Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"changes": []})))
        .expect(1)
        .mount(&h.server)
        .await;

    h.service.sync_pull().await.expect("first pull");
    let state = h.store.get_state().await.unwrap();
    assert_eq!(state.pull_cursor.as_deref(), Some("2026-03-01T12:00:00.000Z"));
    assert!(state.last_pull_at.is_some());

    h.service.sync_pull().await.expect("second pull");
}

#[tokio::test]
async fn test_failed_fetch_keeps_watermark() {
    let h = common::harness().await;
    common::mount_status(&h.server).await;
    Mock::given(method("GET"))
        .and(path("/api/sync/pull"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&h.server)
        .await;

    let err = h.service.sync_pull().await.unwrap_err();
    assert_eq!(err.kind, SyncErrorKind::Remote);

    let state = h.store.get_state().await.unwrap();
    assert!(state.pull_cursor.is_none());
    assert!(state.last_pull_at.is_none());

    let log = h.service.get_log(None).await.unwrap();
    assert_eq!(log[0].status(), SyncStatus::Error);
}
