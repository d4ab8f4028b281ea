//! Integration tests for the connection probe

use std::time::Duration;

use chrono::{TimeZone, Utc};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use possync_core::ports::{IRemoteService, RemoteEndpoint, RemoteError};

use crate::common;

#[tokio::test]
async fn test_status_returns_server_time() {
    let (server, service, endpoint) = common::setup_sync_mock().await;
    common::mount_status(&server, "2026-03-01T12:00:00Z").await;

    let status = service.status(&endpoint).await.expect("status failed");
    assert_eq!(
        status.server_time,
        Some(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn test_status_sends_bearer_token() {
    let (server, service, endpoint) = common::setup_sync_mock().await;
    Mock::given(method("GET"))
        .and(path("/api/sync/status"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let status = service.status(&endpoint).await.unwrap();
    assert!(status.server_time.is_none());
}

#[tokio::test]
async fn test_status_accepts_url_with_prefix() {
    let (server, service, mut endpoint) = common::setup_sync_mock().await;
    common::mount_status(&server, "2026-03-01T12:00:00Z").await;
    endpoint.api_url = format!("{}/api/sync/", server.uri());

    assert!(service.status(&endpoint).await.is_ok());
}

#[tokio::test]
async fn test_status_unauthorized() {
    let (server, service, endpoint) = common::setup_sync_mock().await;
    Mock::given(method("GET"))
        .and(path("/api/sync/status"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .mount(&server)
        .await;

    let err = service.status(&endpoint).await.unwrap_err();
    assert_eq!(err, RemoteError::Unauthorized("invalid token".into()));
}

#[tokio::test]
async fn test_status_forbidden_is_unauthorized() {
    let (server, service, endpoint) = common::setup_sync_mock().await;
    Mock::given(method("GET"))
        .and(path("/api/sync/status"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = service.status(&endpoint).await.unwrap_err();
    assert!(matches!(err, RemoteError::Unauthorized(_)));
}

#[tokio::test]
async fn test_status_server_error() {
    let (server, service, endpoint) = common::setup_sync_mock().await;
    Mock::given(method("GET"))
        .and(path("/api/sync/status"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = service.status(&endpoint).await.unwrap_err();
    assert_eq!(
        err,
        RemoteError::Status {
            status: 503,
            message: "maintenance".into()
        }
    );
}

#[tokio::test]
async fn test_status_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sync/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let service = common::impatient_service();
    let err = service
        .status(&common::endpoint_for(&server))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Timeout(_)));
}

#[tokio::test]
async fn test_status_unreachable() {
    let (_server, service, _) = common::setup_sync_mock().await;
    let endpoint = RemoteEndpoint {
        api_url: "http://127.0.0.1:1".into(),
        empresa_id: 1,
        auth_token: None,
    };

    let err = service.status(&endpoint).await.unwrap_err();
    assert!(matches!(err, RemoteError::Unreachable(_)));
}
