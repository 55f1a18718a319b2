//! Queue state management
//!
//! [`SendQueue`] owns every piece of mutable queue state: the ordered item
//! list, the id→index map giving O(1) lookups, and the idempotency-key
//! bindings. All of it sits behind a single lock and is only reachable
//! through methods, so API calls and dispatch passes serialize instead of
//! racing.

use std::time::{Duration, SystemTime};

use ahash::AHashMap;
use missive_common::SendStatus;
use parking_lot::RwLock;

use crate::{
    config::PriorityBoost,
    error::QueueError,
    scheduler,
    types::{MessageId, QueueItem},
};

#[derive(Debug, Default)]
struct QueueInner {
    items: Vec<QueueItem>,
    /// Position of each id in `items`; rebuilt on every reorder
    index: AHashMap<MessageId, usize>,
    /// Idempotency key → the most recent item enqueued with it
    idempotency: AHashMap<String, MessageId>,
}

impl QueueInner {
    fn get(&self, id: &MessageId) -> Option<&QueueItem> {
        let i = self.index.get(id).copied()?;
        self.items.get(i)
    }

    fn get_mut(&mut self, id: &MessageId) -> Option<&mut QueueItem> {
        let i = self.index.get(id).copied()?;
        self.items.get_mut(i)
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id, i))
            .collect();
    }

    fn active_len(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.status.is_active())
            .count()
    }
}

/// The delivery queue's in-memory state
#[derive(Debug, Default)]
pub struct SendQueue {
    inner: RwLock<QueueInner>,
}

impl SendQueue {
    /// Create a new empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new item, enforcing the capacity gate and idempotency-key
    /// uniqueness.
    ///
    /// Critical-priority items bypass the capacity gate. A key already
    /// bound to an active item rejects the insert; a key whose item has
    /// reached a terminal state is rebound to the new item.
    ///
    /// # Errors
    ///
    /// [`QueueError::Capacity`] or [`QueueError::Duplicate`].
    pub fn insert(&self, item: QueueItem, max_size: usize) -> Result<(), QueueError> {
        let inner = &mut *self.inner.write();

        if item.priority != missive_common::Priority::Critical {
            let len = inner.active_len();
            if len >= max_size {
                return Err(QueueError::Capacity { len, max: max_size });
            }
        }

        if let Some(key) = &item.idempotency_key
            && let Some(&bound) = inner.idempotency.get(key)
            && let Some(existing) = inner.get(&bound)
            && existing.status.is_active()
        {
            return Err(QueueError::Duplicate {
                key: key.clone(),
                id: bound,
            });
        }

        if let Some(key) = &item.idempotency_key {
            inner.idempotency.insert(key.clone(), item.id);
        }

        inner.index.insert(item.id, inner.items.len());
        inner.items.push(item);

        Ok(())
    }

    /// Cancel a pending item.
    ///
    /// # Errors
    ///
    /// [`QueueError::NotFound`] for unknown ids,
    /// [`QueueError::InvalidTransition`] when the item has already been
    /// selected for processing or reached a terminal state.
    pub fn cancel(&self, id: &MessageId) -> Result<(), QueueError> {
        let inner = &mut *self.inner.write();
        let item = inner.get_mut(id).ok_or(QueueError::NotFound(*id))?;

        if item.status != SendStatus::Pending {
            return Err(QueueError::InvalidTransition {
                operation: "cancel",
                id: *id,
                status: item.status,
            });
        }

        item.status = SendStatus::Cancelled;
        Ok(())
    }

    /// A clone of the item with this id
    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<QueueItem> {
        self.inner.read().get(id).cloned()
    }

    /// Apply `f` to the item with this id, returning its result
    pub fn with_item_mut<R>(&self, id: &MessageId, f: impl FnOnce(&mut QueueItem) -> R) -> Option<R> {
        self.inner.write().get_mut(id).map(f)
    }

    /// Recompute pending scores as of `now` and restore the total queue
    /// order (pending first, score descending, FIFO ties)
    pub fn refresh_and_sort(&self, boost: &PriorityBoost, now: SystemTime) {
        let inner = &mut *self.inner.write();

        for item in &mut inner.items {
            if item.status == SendStatus::Pending {
                item.dynamic_priority = scheduler::score(item, boost, now);
            }
        }

        inner.items.sort_by(|a, b| scheduler::compare(a, b));
        inner.rebuild_index();
    }

    /// Scan pending items in queue order and claim up to `budget` of them
    /// for dispatch.
    ///
    /// `permit` is consulted for each due candidate; returning `true`
    /// claims the item (it is marked processing with its attempt counter
    /// incremented) and is the point where rate/throttle consumption must
    /// be recorded. The whole scan runs under the queue lock, so a
    /// concurrent cancel can never catch a half-claimed item.
    pub fn select_for_dispatch(
        &self,
        now: SystemTime,
        budget: usize,
        mut permit: impl FnMut(&QueueItem) -> bool,
    ) -> Vec<QueueItem> {
        let inner = &mut *self.inner.write();
        let mut batch = Vec::new();

        for i in 0..inner.items.len() {
            if batch.len() >= budget {
                break;
            }

            let item = &inner.items[i];
            if item.status != SendStatus::Pending || !item.is_due(now) || !permit(item) {
                continue;
            }

            let item = &mut inner.items[i];
            item.status = SendStatus::Processing;
            item.attempts += 1;
            batch.push(item.clone());
        }

        batch
    }

    /// Clones of all active (pending/processing) items, for snapshotting
    #[must_use]
    pub fn snapshot_active(&self) -> Vec<QueueItem> {
        self.inner
            .read()
            .items
            .iter()
            .filter(|item| item.status.is_active())
            .cloned()
            .collect()
    }

    /// Re-admit items restored from a snapshot.
    ///
    /// Items caught mid-flight by the crash are requeued as pending, ids
    /// already present are skipped, and idempotency keys of active items
    /// are rebound. Returns the number of items admitted.
    pub fn restore(&self, items: Vec<QueueItem>) -> usize {
        let inner = &mut *self.inner.write();
        let mut admitted = 0;

        for mut item in items {
            if inner.index.contains_key(&item.id) {
                continue;
            }

            if item.status == SendStatus::Processing {
                item.status = SendStatus::Pending;
            }

            if item.status.is_active()
                && let Some(key) = &item.idempotency_key
            {
                inner.idempotency.insert(key.clone(), item.id);
            }

            inner.index.insert(item.id, inner.items.len());
            inner.items.push(item);
            admitted += 1;
        }

        admitted
    }

    /// Drop terminal items older than `max_age`. Returns how many were
    /// removed.
    pub fn reap_terminal(&self, max_age: Duration, now: SystemTime) -> usize {
        let inner = &mut *self.inner.write();
        let before = inner.items.len();

        inner.items.retain(|item| {
            let age = now.duration_since(item.created_at).unwrap_or_default();
            !(item.status.is_terminal() && age > max_age)
        });

        let removed = before - inner.items.len();
        if removed > 0 {
            inner.rebuild_index();
        }

        removed
    }

    /// Prune idempotency keys no longer bound to an active item, once the
    /// cache has grown past `threshold`. Returns how many keys were
    /// dropped.
    pub fn prune_idempotency(&self, threshold: usize) -> usize {
        let inner = &mut *self.inner.write();

        if inner.idempotency.len() <= threshold {
            return 0;
        }

        let before = inner.idempotency.len();
        let retained: AHashMap<String, MessageId> = inner
            .idempotency
            .iter()
            .filter(|(_, id)| inner.get(id).is_some_and(|item| item.status.is_active()))
            .map(|(key, id)| (key.clone(), *id))
            .collect();
        inner.idempotency = retained;

        before - inner.idempotency.len()
    }

    /// Total number of items currently held, terminal included
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().items.is_empty()
    }

    /// Number of active (pending/processing) items
    #[must_use]
    pub fn active_len(&self) -> usize {
        self.inner.read().active_len()
    }

    /// Number of idempotency keys currently cached
    #[must_use]
    pub fn idempotency_len(&self) -> usize {
        self.inner.read().idempotency.len()
    }

    /// Count items per status and per priority in one pass
    #[must_use]
    pub fn count_by(&self) -> (AHashMap<SendStatus, usize>, AHashMap<missive_common::Priority, usize>) {
        let inner = self.inner.read();
        let mut by_status = AHashMap::new();
        let mut by_priority = AHashMap::new();

        for item in &inner.items {
            *by_status.entry(item.status).or_insert(0) += 1;
            *by_priority.entry(item.priority).or_insert(0) += 1;
        }

        (by_status, by_priority)
    }
}
