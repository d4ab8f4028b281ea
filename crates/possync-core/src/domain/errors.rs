//! Domain error types
//!
//! Validation failures raised while constructing or parsing domain values.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A table or column name is not a plain SQL identifier
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// The remote API URL is malformed or uses an unsupported scheme
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    /// Unknown value for an enumerated field (sync type, status, resolution)
    #[error("Invalid {field} value: {value}")]
    InvalidValue {
        /// Name of the field being parsed
        field: &'static str,
        /// The rejected input
        value: String,
    },

    /// Sync endpoint settings are incomplete
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
