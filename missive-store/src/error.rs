//! Error types for the missive-store crate.

use std::io;

use thiserror::Error;

/// Top-level store error type.
///
/// All store operations return this error type, which categorizes failures
/// into I/O, capacity and logical errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O operation failed (backends touching disk or network).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Key not present in the store.
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Store refused a write because its capacity bound was reached.
    #[error("Store capacity exceeded: {len}/{capacity} entries")]
    CapacityExceeded { len: usize, capacity: usize },

    /// Internal error (lock poisoning, backend-specific failures).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

// Convenience conversion for lock poisoning
impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}
