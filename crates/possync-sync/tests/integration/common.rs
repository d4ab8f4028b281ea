//! Shared fixtures: a configured service, a `products` table, and mocks for
//! the three sync endpoints.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use possync_cache::{DatabasePool, SqliteSyncStore};
use possync_core::{
    domain::{newtypes::TableName, SyncConfigUpdate},
    ports::{ISyncStore, LocalRecord},
};
use possync_remote::{HttpRemoteService, SyncApiClient};
use possync_sync::{SyncService, SyncSettings};

pub const TEST_TOKEN: &str = "secret-token";
pub const TEST_EMPRESA: i64 = 7;

/// A row stamped before any test cycle
pub const T0: &str = "2026-01-10T08:00:00.000Z";
/// A later local edit
pub const T1: &str = "2026-01-10T09:00:00.000Z";

pub struct Harness {
    pub server: MockServer,
    pub store: Arc<SqliteSyncStore>,
    pub service: Arc<SyncService>,
}

pub fn products() -> TableName {
    TableName::new("products").unwrap()
}

pub fn settings() -> SyncSettings {
    SyncSettings {
        tables: vec![products()],
        ..SyncSettings::default()
    }
}

/// Store over a fresh in-memory database with a `products` table
pub async fn products_store() -> Arc<SqliteSyncStore> {
    let pool = DatabasePool::in_memory().await.expect("in-memory db");
    sqlx::query(
        "CREATE TABLE products (\
            id INTEGER PRIMARY KEY, \
            name TEXT NOT NULL, \
            price REAL, \
            updated_at TEXT, \
            synced_at TEXT)",
    )
    .execute(pool.pool())
    .await
    .expect("create products");
    Arc::new(SqliteSyncStore::new(pool.pool().clone()))
}

pub fn http_remote() -> Arc<HttpRemoteService> {
    Arc::new(HttpRemoteService::new(SyncApiClient::with_timeouts(
        Duration::from_secs(2),
        Duration::from_secs(5),
    )))
}

/// Service over a fresh database with a `products` table, not configured
pub async fn unconfigured(settings: SyncSettings) -> (Arc<SqliteSyncStore>, Arc<SyncService>) {
    let store = products_store().await;
    let service = Arc::new(SyncService::new(store.clone(), http_remote(), settings));
    (store, service)
}

/// Points `service` at `server` with the test credentials
pub async fn configure(service: &SyncService, server: &MockServer) {
    service
        .configure(SyncConfigUpdate {
            api_url: Some(server.uri()),
            empresa_id: Some(TEST_EMPRESA),
            auth_token: Some(TEST_TOKEN.to_string()),
            ..SyncConfigUpdate::default()
        })
        .await
        .expect("configure");
}

/// Service configured against a fresh mock server
pub async fn harness_with(settings: SyncSettings) -> Harness {
    let server = MockServer::start().await;
    let (store, service) = unconfigured(settings).await;
    configure(&service, &server).await;
    Harness {
        server,
        store,
        service,
    }
}

pub async fn harness() -> Harness {
    harness_with(settings()).await
}

pub async fn mount_status(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/sync/status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"server_time": "2026-03-01T12:00:00Z"})),
        )
        .mount(server)
        .await;
}

/// Mounts `GET pull` answering with `changes`, expected `times` times
pub async fn mount_pull(server: &MockServer, changes: Vec<Value>, times: u64) {
    Mock::given(method("GET"))
        .and(path("/api/sync/pull"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "changes": changes,
            "server_time": "2026-03-01T12:00:00Z"
        })))
        .expect(times)
        .mount(server)
        .await;
}

/// Mounts `POST push` acknowledging every batch, expected `times` times
pub async fn mount_push(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/sync/push"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accepted": 1})))
        .expect(times)
        .mount(server)
        .await;
}

/// One remote `products` change
pub fn product_change(id: i64, name: &str, price: f64) -> Value {
    json!({
        "table_name": "products",
        "record_id": id,
        "data": {"id": id, "name": name, "price": price},
        "updated_at": "2026-03-01T11:00:00Z"
    })
}

pub async fn insert_product(
    store: &SqliteSyncStore,
    id: i64,
    name: &str,
    updated_at: &str,
    synced_at: Option<&str>,
) {
    sqlx::query(
        "INSERT INTO products (id, name, price, updated_at, synced_at) VALUES (?, ?, 1.0, ?, ?)",
    )
    .bind(id)
    .bind(name)
    .bind(updated_at)
    .bind(synced_at)
    .execute(store.pool())
    .await
    .expect("insert product");
}

/// A product that was synced at T0 and not edited since
pub async fn insert_clean_product(store: &SqliteSyncStore, id: i64, name: &str) {
    insert_product(store, id, name, T0, Some(T0)).await;
}

/// A product edited at T1 after being synced at T0
pub async fn insert_edited_product(store: &SqliteSyncStore, id: i64, name: &str) {
    insert_product(store, id, name, T1, Some(T0)).await;
}

pub async fn product(store: &SqliteSyncStore, id: i64) -> Option<LocalRecord> {
    store.get_record(&products(), id).await.expect("get product")
}
