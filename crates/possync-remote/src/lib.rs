//! possync Remote - Cloud sync API client
//!
//! Provides the async HTTP side of synchronization:
//! - Connection probing (`GET status`)
//! - Incremental change download (`GET pull`)
//! - Batched change upload (`POST push`)
//!
//! ## Modules
//!
//! - [`client`] - Typed reqwest client, URL building and error classification
//! - [`provider`] - `IRemoteService` implementation used by the sync engine

pub mod client;
pub mod provider;

pub use client::SyncApiClient;
pub use provider::HttpRemoteService;
