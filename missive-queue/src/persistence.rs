//! Snapshot and restore of in-flight queue state
//!
//! All pending and processing items are serialized as one flat JSON array
//! under a single key in the durable store. Snapshots are periodic and
//! best-effort: work created or mutated between the last snapshot and a
//! crash is lost.

use missive_store::KeyValueStore;
use tracing::{debug, warn};

use crate::{error::QueueError, queue::SendQueue, types::QueueItem};

/// Write all active items to the store under `key`.
///
/// Returns the number of items captured.
///
/// # Errors
///
/// Returns [`QueueError::Serialization`] when encoding fails and
/// [`QueueError::Store`] when the collaborator rejects the write.
pub async fn snapshot(
    queue: &SendQueue,
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<usize, QueueError> {
    let items = queue.snapshot_active();
    let bytes = serde_json::to_vec(&items)?;
    store.put(key, bytes, None).await?;

    debug!(count = items.len(), key, "Persisted queue snapshot");
    Ok(items.len())
}

/// Load the snapshot stored under `key` back into the queue.
///
/// Entries that fail to decode or no longer pass structural validation are
/// dropped with a warning rather than aborting startup. Items that were
/// mid-flight when the snapshot was taken are requeued as pending. Returns
/// the number of items admitted.
///
/// # Errors
///
/// Returns [`QueueError::Store`] when the collaborator read fails and
/// [`QueueError::Serialization`] when the record is not a JSON array.
pub async fn restore(
    queue: &SendQueue,
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<usize, QueueError> {
    let Some(bytes) = store.get(key).await? else {
        debug!(key, "No queue snapshot to restore");
        return Ok(0);
    };

    let entries: Vec<serde_json::Value> = serde_json::from_slice(&bytes)?;
    let total = entries.len();
    let mut items = Vec::with_capacity(total);

    for entry in entries {
        match serde_json::from_value::<QueueItem>(entry) {
            Ok(item) => {
                if let Err(e) = item.payload.validate() {
                    warn!(id = %item.id, error = %e, "Dropping invalid snapshot entry");
                } else if item.attempts > item.max_attempts {
                    warn!(id = %item.id, "Dropping snapshot entry with overspent attempts");
                } else {
                    items.push(item);
                }
            }
            Err(e) => {
                warn!(error = %e, "Dropping undecodable snapshot entry");
            }
        }
    }

    let admitted = queue.restore(items);
    debug!(admitted, dropped = total - admitted, key, "Restored queue snapshot");
    Ok(admitted)
}
