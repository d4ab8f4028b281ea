//! possync Audit - Durable sync log
//!
//! Provides:
//! - `SyncLogger`: High-level service for recording sync log entries
//! - Integration with `ISyncStore` for persistent log storage

pub mod logger;

pub use logger::SyncLogger;
