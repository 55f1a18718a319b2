use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use async_trait::async_trait;

use crate::{StoreError, traits::KeyValueStore};

#[derive(Debug, Clone)]
struct Entry {
    value: Arc<[u8]>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory key-value store implementation
///
/// This implementation stores values in a `HashMap` protected by an
/// `RwLock`. It's primarily intended for testing, but can also be used for
/// transient deployments where snapshot durability across process restarts
/// is not required.
///
/// # Capacity Management
/// The store can be configured with a maximum capacity to prevent unbounded
/// memory growth. When capacity is reached, writes of new keys fail with an
/// error; overwrites of existing keys are always allowed.
///
/// # TTL
/// Entries written with a TTL are dropped lazily: an expired entry reads as
/// absent and is removed on the next write pass.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    capacity: Option<usize>,
}

impl MemoryStore {
    /// Create a new empty memory store with unlimited capacity
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new memory store with a capacity limit
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            capacity: Some(capacity),
        }
    }

    /// Get the current number of live entries in the store
    ///
    /// Recovers gracefully if the lock is poisoned by accessing the
    /// underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the configured capacity (None = unlimited)
    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> crate::Result<Option<Vec<u8>>> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()?
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.to_vec()))
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> crate::Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.write()?;

        // Expired entries no longer count against capacity
        entries.retain(|_, entry| !entry.is_expired(now));

        if let Some(capacity) = self.capacity
            && !entries.contains_key(key)
            && entries.len() >= capacity
        {
            return Err(StoreError::CapacityExceeded {
                len: entries.len(),
                capacity,
            });
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: Arc::from(value),
                expires_at: ttl.map(|ttl| now + ttl),
            },
        );

        Ok(())
    }

    async fn delete(&self, key: &str) -> crate::Result<()> {
        self.entries
            .write()?
            .remove(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Ok(())
    }
}
