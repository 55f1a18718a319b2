//! Periodic queue hygiene
//!
//! Terminal items are kept around for status queries until they age out;
//! the idempotency cache is pruned of unbound keys once it grows past its
//! threshold.

use std::time::{Duration, SystemTime};

use tracing::debug;

use crate::service::MailQueue;

/// Run one cleanup pass. Returns `(items_reaped, keys_pruned)`.
pub(crate) fn run(mq: &MailQueue) -> (usize, usize) {
    let now = SystemTime::now();
    let max_age = Duration::from_secs(mq.config.max_age_secs);

    let reaped = mq.queue.reap_terminal(max_age, now);
    let pruned = mq
        .queue
        .prune_idempotency(mq.config.idempotency_prune_threshold);

    if reaped > 0 || pruned > 0 {
        debug!(reaped, pruned, "Cleanup pass complete");
    }

    (reaped, pruned)
}
