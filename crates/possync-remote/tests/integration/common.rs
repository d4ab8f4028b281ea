//! Shared test helpers for sync API integration tests
//!
//! Each helper starts a wiremock server and returns a service plus an
//! endpoint pointing at it.

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use possync_core::ports::RemoteEndpoint;
use possync_remote::{HttpRemoteService, SyncApiClient};

pub const TEST_TOKEN: &str = "test-token";
pub const TEST_EMPRESA: i64 = 7;

/// Endpoint for `server` as an operator would configure it (no `/api/sync`)
pub fn endpoint_for(server: &MockServer) -> RemoteEndpoint {
    RemoteEndpoint {
        api_url: server.uri(),
        empresa_id: TEST_EMPRESA,
        auth_token: Some(TEST_TOKEN.to_string()),
    }
}

/// Starts a mock server and returns a (MockServer, service, endpoint) tuple
pub async fn setup_sync_mock() -> (MockServer, HttpRemoteService, RemoteEndpoint) {
    let server = MockServer::start().await;
    let endpoint = endpoint_for(&server);
    (server, HttpRemoteService::default(), endpoint)
}

/// Service with short timeouts for timeout tests
pub fn impatient_service() -> HttpRemoteService {
    HttpRemoteService::new(SyncApiClient::with_timeouts(
        Duration::from_millis(100),
        Duration::from_millis(100),
    ))
}

/// Mounts `GET /api/sync/status` returning the given server time
pub async fn mount_status(server: &MockServer, server_time: &str) {
    Mock::given(method("GET"))
        .and(path("/api/sync/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "server_time": server_time
        })))
        .mount(server)
        .await;
}
