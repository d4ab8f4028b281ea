//! `check_connection` and the preflight probe

use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use possync_core::domain::{SyncConfigUpdate, SyncStatus};
use possync_sync::{connection::NOT_CONFIGURED, SyncErrorKind};

use crate::common;

#[tokio::test]
async fn test_unconfigured_is_not_connected_without_request() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (_store, service) = common::unconfigured(common::settings()).await;
    let status = service.check_connection().await;

    assert!(!status.connected);
    assert_eq!(status.message, NOT_CONFIGURED);
}

#[tokio::test]
async fn test_reachable_remote_is_connected() {
    let h = common::harness().await;
    common::mount_status(&h.server).await;

    let status = h.service.check_connection().await;
    assert!(status.connected);
    assert!(status.server_time.is_some());
}

#[tokio::test]
async fn test_probe_works_without_empresa() {
    let server = MockServer::start().await;
    common::mount_status(&server).await;
    let (_store, service) = common::unconfigured(common::settings()).await;
    service
        .configure(SyncConfigUpdate {
            api_url: Some(server.uri()),
            ..SyncConfigUpdate::default()
        })
        .await
        .unwrap();

    assert!(service.check_connection().await.connected);
}

#[tokio::test]
async fn test_server_error_is_not_connected() {
    let h = common::harness().await;
    Mock::given(method("GET"))
        .and(path("/api/sync/status"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.server)
        .await;

    let status = h.service.check_connection().await;
    assert!(!status.connected);
    assert!(status.message.contains("503"));
}

#[tokio::test]
async fn test_failed_preflight_stops_pull() {
    let h = common::harness().await;
    Mock::given(method("GET"))
        .and(path("/api/sync/status"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.server)
        .await;
    common::mount_pull(&h.server, vec![], 0).await;

    let err = h.service.sync_pull().await.unwrap_err();
    assert_eq!(err.kind, SyncErrorKind::Network);
    assert!(err.message.starts_with("Cannot reach sync server"));

    let log = h.service.get_log(None).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status(), SyncStatus::Error);
}

#[tokio::test]
async fn test_rejected_preflight_is_unauthorized() {
    let h = common::harness().await;
    Mock::given(method("GET"))
        .and(path("/api/sync/status"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&h.server)
        .await;

    let err = h.service.sync_full().await.unwrap_err();
    assert_eq!(err.kind, SyncErrorKind::Unauthorized);
}
