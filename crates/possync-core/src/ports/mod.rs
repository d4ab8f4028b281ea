//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the traits the sync engine depends on; their implementations
//! live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ISyncStore`] - Local SQLite database (metadata tables and business rows)
//! - [`IRemoteService`] - Cloud sync HTTP API

pub mod remote_service;
pub mod sync_store;

pub use remote_service::{
    IRemoteService, PullResponse, PushAck, RecordChange, RemoteEndpoint, RemoteError, RemoteStatus,
};
pub use sync_store::{ISyncStore, LocalRecord};
