//! Configuration, stats, log maintenance and conflict resolution

use chrono::{Duration, Utc};
use serde_json::json;

use possync_core::{
    domain::{
        newtypes::ConflictId, Resolution, SyncConfigUpdate, SyncLogEntry, SyncStatus, SyncType,
    },
    ports::ISyncStore,
};
use possync_sync::{connection::NOT_CONFIGURED, SyncErrorKind};

use crate::common::{self, product, product_change};

#[tokio::test]
async fn test_unconfigured_sync_fails_and_is_logged() {
    let (_store, service) = common::unconfigured(common::settings()).await;

    let err = service.sync_full().await.unwrap_err();
    assert_eq!(err.kind, SyncErrorKind::Configuration);
    assert_eq!(err.message, NOT_CONFIGURED);

    let log = service.get_log(None).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].sync_type(), SyncType::Full);
    assert_eq!(log[0].status(), SyncStatus::Error);
    assert_eq!(log[0].error_message(), Some(NOT_CONFIGURED));
}

#[tokio::test]
async fn test_disabled_sync_is_rejected() {
    let h = common::harness().await;
    h.service
        .configure(SyncConfigUpdate {
            enabled: Some(false),
            ..SyncConfigUpdate::default()
        })
        .await
        .unwrap();

    for result in [
        h.service.sync_full().await,
        h.service.sync_pull().await,
        h.service.sync_push().await,
    ] {
        assert_eq!(result.unwrap_err().kind, SyncErrorKind::Disabled);
    }
    assert_eq!(h.service.get_log(None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_configure_masks_token_but_stores_it() {
    let h = common::harness().await;

    let shown = h.service.get_config().await.unwrap();
    assert_eq!(shown.auth_token.as_deref(), Some("********"));
    assert_eq!(shown.empresa_id, Some(common::TEST_EMPRESA));

    let stored = h.service.load_config().await.unwrap();
    assert_eq!(stored.auth_token.as_deref(), Some(common::TEST_TOKEN));
}

#[tokio::test]
async fn test_invalid_configuration_is_not_saved() {
    let h = common::harness().await;

    let err = h
        .service
        .configure(SyncConfigUpdate {
            sync_interval: Some(5),
            ..SyncConfigUpdate::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind, SyncErrorKind::Validation);

    let err = h
        .service
        .configure(SyncConfigUpdate {
            api_url: Some("ftp://example.com".into()),
            ..SyncConfigUpdate::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind, SyncErrorKind::Validation);

    let config = h.service.load_config().await.unwrap();
    assert_eq!(config.sync_interval, 300);
    assert_eq!(config.api_url.as_deref(), Some(h.server.uri().as_str()));
}

#[tokio::test]
async fn test_stats_reflect_local_state() {
    let h = common::harness().await;
    common::insert_edited_product(&h.store, 1, "Edited").await;
    common::insert_product(&h.store, 2, "New", common::T1, None).await;
    common::insert_clean_product(&h.store, 3, "Clean").await;
    h.service
        .configure(SyncConfigUpdate {
            auto_sync: Some(true),
            sync_interval: Some(600),
            ..SyncConfigUpdate::default()
        })
        .await
        .unwrap();

    let stats = h.service.get_stats().await.unwrap();
    assert_eq!(stats.pending_changes, 2);
    assert_eq!(stats.unresolved_conflicts, 0);
    assert!(stats.last_sync.is_none());
    assert!(stats.auto_sync_enabled);
    assert_eq!(stats.sync_interval, 600);
}

#[tokio::test]
async fn test_clean_log_removes_only_old_entries() {
    let h = common::harness().await;
    let old = SyncLogEntry::new(SyncType::Pull, "pull")
        .with_status(SyncStatus::Success)
        .with_started_at(Utc::now() - Duration::days(45));
    let recent = SyncLogEntry::new(SyncType::Push, "push")
        .with_status(SyncStatus::Success)
        .with_started_at(Utc::now() - Duration::days(2));
    h.store.insert_log(&old).await.unwrap();
    h.store.insert_log(&recent).await.unwrap();

    let removed = h.service.clean_log(Some(30)).await.unwrap();
    assert_eq!(removed, 1);

    let log = h.service.get_log(None).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].operation(), "push");
}

#[tokio::test]
async fn test_get_log_honors_limit() {
    let h = common::harness().await;
    for _ in 0..5 {
        h.store
            .insert_log(&SyncLogEntry::new(SyncType::Pull, "pull").with_status(SyncStatus::Success))
            .await
            .unwrap();
    }

    assert_eq!(h.service.get_log(Some(2)).await.unwrap().len(), 2);
    assert_eq!(h.service.get_log(None).await.unwrap().len(), 5);
}

async fn conflict_on_42(h: &common::Harness) -> ConflictId {
    common::insert_edited_product(&h.store, 42, "Local Name").await;
    common::mount_status(&h.server).await;
    common::mount_pull(&h.server, vec![product_change(42, "Remote Name", 9.0)], 1).await;
    h.service.sync_pull().await.expect("pull");

    let conflicts = h.service.get_conflicts(false).await.unwrap();
    conflicts[0].id().expect("saved conflict has an id")
}

#[tokio::test]
async fn test_resolve_remote_applies_remote_snapshot() {
    let h = common::harness().await;
    let id = conflict_on_42(&h).await;

    let resolved = h
        .service
        .resolve_conflict(id, Resolution::Remote)
        .await
        .unwrap();
    assert_eq!(resolved.resolution(), Some(Resolution::Remote));

    let row = product(&h.store, 42).await.unwrap();
    assert_eq!(row.data.get("name"), Some(&json!("Remote Name")));
    assert!(!row.is_dirty());
    assert!(h.service.get_conflicts(false).await.unwrap().is_empty());
    assert_eq!(h.service.get_conflicts(true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_resolve_local_keeps_row_dirty() {
    let h = common::harness().await;
    let id = conflict_on_42(&h).await;

    h.service
        .resolve_conflict(id, Resolution::Local)
        .await
        .unwrap();

    let row = product(&h.store, 42).await.unwrap();
    assert_eq!(row.data.get("name"), Some(&json!("Local Name")));
    assert!(row.is_dirty());
}

#[tokio::test]
async fn test_resolve_errors() {
    let h = common::harness().await;
    let id = conflict_on_42(&h).await;

    let err = h
        .service
        .resolve_conflict(ConflictId::new(999), Resolution::Local)
        .await
        .unwrap_err();
    assert_eq!(err.kind, SyncErrorKind::NotFound);

    h.service
        .resolve_conflict(id, Resolution::Remote)
        .await
        .unwrap();
    let err = h
        .service
        .resolve_conflict(id, Resolution::Local)
        .await
        .unwrap_err();
    assert_eq!(err.kind, SyncErrorKind::AlreadyResolved);
}

#[tokio::test]
async fn test_resolve_all_clears_open_conflicts() {
    let h = common::harness().await;
    conflict_on_42(&h).await;

    let result = h
        .service
        .resolve_all_conflicts(Resolution::Local)
        .await
        .unwrap();
    assert_eq!(result.resolved, 1);
    assert_eq!(h.service.get_stats().await.unwrap().unresolved_conflicts, 0);
}
