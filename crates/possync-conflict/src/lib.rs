//! possync Conflict - Conflict detection and resolution
//!
//! Provides:
//! - Detection of divergent rows during a pull
//! - Manual resolution (keep local or take remote), one at a time or in bulk

pub mod detector;
pub mod error;
pub mod resolver;

pub use detector::{ConflictDetector, DetectionResult};
pub use error::ConflictError;
pub use resolver::{BatchResult, ConflictResolver};
