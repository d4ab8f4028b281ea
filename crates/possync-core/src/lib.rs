//! possync Core - Domain types and ports
//!
//! This crate holds the hexagonal core of the synchronization engine:
//! - **Domain entities** - `SyncConfig`, `SyncLogEntry`, `SyncConflict`, `Record`, `SyncStats`
//! - **Port definitions** - `ISyncStore` (local database) and `IRemoteService` (cloud API)
//! - **Application configuration** - YAML-backed [`config::Config`]
//!
//! # Architecture
//!
//! The domain module has no I/O. Adapter crates (`possync-cache`,
//! `possync-remote`) implement the ports; `possync-sync` drives them.

pub mod config;
pub mod domain;
pub mod ports;
