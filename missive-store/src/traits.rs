//! Collaborator trait for durable key-value storage

use std::{fmt, time::Duration};

use async_trait::async_trait;

/// A durable key-value store the queue snapshots its state into.
///
/// Implementations must be safe for concurrent use; every method is an
/// opaque asynchronous operation from the queue's point of view. Values are
/// raw bytes so backends never need to know the snapshot format.
#[async_trait]
pub trait KeyValueStore: fmt::Debug + Send + Sync {
    /// Fetch the value stored under `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> crate::Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, overwriting any previous value.
    ///
    /// A `ttl` of `None` stores the value until it is overwritten or
    /// deleted.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> crate::Result<()>;

    /// Remove the value stored under `key`.
    ///
    /// Returns [`crate::StoreError::NotFound`] when the key is absent.
    async fn delete(&self, key: &str) -> crate::Result<()>;
}
