//! Error types for the conflict engine

use thiserror::Error;

/// Errors that can occur during conflict resolution
#[derive(Debug, Error)]
pub enum ConflictError {
    /// Conflict not found in the store
    #[error("conflict not found: {0}")]
    NotFound(String),

    /// Conflict already resolved
    #[error("conflict already resolved: {0}")]
    AlreadyResolved(String),

    /// Storage error
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}
