//! Push engine behavior through `sync_push`

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use possync_core::{
    domain::{SyncStatus, SyncType},
    ports::ISyncStore,
};
use possync_sync::{SyncErrorKind, SyncSettings};

use crate::common::{self, product, products};

#[tokio::test]
async fn test_nothing_dirty_makes_no_request() {
    let h = common::harness().await;
    common::insert_clean_product(&h.store, 1, "Tea").await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let summary = h.service.sync_push().await.expect("push");
    assert_eq!(summary.sync_type, SyncType::Push);
    assert_eq!(summary.sent_changes, 0);
    assert_eq!(summary.status, SyncStatus::Success);
}

#[tokio::test]
async fn test_dirty_rows_are_sent_and_marked_clean() {
    let h = common::harness().await;
    common::insert_product(&h.store, 1, "New", common::T1, None).await;
    common::insert_edited_product(&h.store, 2, "Edited").await;
    common::insert_clean_product(&h.store, 3, "Untouched").await;

    Mock::given(method("POST"))
        .and(path("/api/sync/push"))
        .and(header("authorization", format!("Bearer {}", common::TEST_TOKEN).as_str()))
        .and(body_partial_json(json!({"empresa_id": common::TEST_EMPRESA})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accepted": 2})))
        .expect(1)
        .mount(&h.server)
        .await;

    let summary = h.service.sync_push().await.expect("push");
    assert_eq!(summary.sent_changes, 2);

    assert_eq!(h.store.count_dirty(&products()).await.unwrap(), 0);
    assert!(!product(&h.store, 1).await.unwrap().is_dirty());
    assert!(h.store.get_state().await.unwrap().last_push_at.is_some());
}

#[tokio::test]
async fn test_push_is_sent_in_chunks() {
    let h = common::harness_with(SyncSettings {
        push_chunk_size: 2,
        ..common::settings()
    })
    .await;
    for id in 1..=5 {
        common::insert_product(&h.store, id, "Row", common::T1, None).await;
    }
    common::mount_push(&h.server, 3).await;

    let summary = h.service.sync_push().await.expect("push");
    assert_eq!(summary.sent_changes, 5);
    assert_eq!(h.store.count_dirty(&products()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_push_leaves_rows_dirty() {
    let h = common::harness().await;
    common::insert_edited_product(&h.store, 1, "Edited").await;
    Mock::given(method("POST"))
        .and(path("/api/sync/push"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.service.sync_push().await.unwrap_err();
    assert_eq!(err.kind, SyncErrorKind::Remote);

    let row = product(&h.store, 1).await.unwrap();
    assert!(row.is_dirty());
    assert_eq!(row.synced_at.as_deref(), Some(common::T0));
    assert!(h.store.get_state().await.unwrap().last_push_at.is_none());

    let log = h.service.get_log(None).await.unwrap();
    assert_eq!(log[0].status(), SyncStatus::Error);
}

#[tokio::test]
async fn test_push_does_not_probe_status() {
    let h = common::harness().await;
    common::insert_edited_product(&h.store, 1, "Edited").await;
    Mock::given(method("GET"))
        .and(path("/api/sync/status"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;
    common::mount_push(&h.server, 1).await;

    h.service.sync_push().await.expect("push");
}

#[tokio::test]
async fn test_rejected_token_is_unauthorized() {
    let h = common::harness().await;
    common::insert_edited_product(&h.store, 1, "Edited").await;
    Mock::given(method("POST"))
        .and(path("/api/sync/push"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;

    let err = h.service.sync_push().await.unwrap_err();
    assert_eq!(err.kind, SyncErrorKind::Unauthorized);
    assert!(product(&h.store, 1).await.unwrap().is_dirty());
}
