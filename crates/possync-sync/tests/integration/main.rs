//! Integration tests for possync-sync
//!
//! Every test drives a real `SyncService` over an in-memory SQLite store and
//! the HTTP adapter pointed at a wiremock server.

mod common;
mod test_connection;
mod test_local_edits;
mod test_pull;
mod test_push;
mod test_service;
