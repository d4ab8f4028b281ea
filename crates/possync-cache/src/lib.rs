//! possync Cache - Local state persistence
//!
//! SQLite-based storage for:
//! - The sync endpoint configuration and replication watermarks
//! - The sync log
//! - Recorded conflicts
//! - Generic read/write access to the synchronized business tables
//!
//! ## Architecture
//!
//! This crate implements the `ISyncStore` port from `possync-core` using
//! SQLite as the storage backend. It is a driven (secondary) adapter in the
//! hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with schema setup
//! - [`SqliteSyncStore`] - Full `ISyncStore` implementation
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use possync_cache::{DatabasePool, SqliteSyncStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/pos/pos.db")).await?;
//! let store = SqliteSyncStore::new(pool.pool().clone());
//! // Use store as ISyncStore...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteSyncStore;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A business table is missing or lacks the change-tracking columns
    #[error("Table {table} is not synchronizable: {reason}")]
    UnsupportedTable {
        /// Table name
        table: String,
        /// What is missing
        reason: String,
    },
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
