//! Dynamic priority scoring and queue ordering
//!
//! Every dispatch tick recomputes a ranking score for each pending item:
//!
//! ```text
//! score = tier_weight + attempts * boost.retry_count + wait_minutes * boost.wait_time
//! ```
//!
//! The wait-time term grows without bound, so long-waiting low-tier items
//! eventually outrank fresh high-tier ones. This is an anti-starvation
//! heuristic, not a fairness guarantee: an item's position still depends on
//! what else is queued at that moment.

use std::{cmp::Ordering, time::SystemTime};

use missive_common::SendStatus;

use crate::{config::PriorityBoost, types::QueueItem};

/// Compute the ranking score for `item` as of `now`
#[must_use]
pub fn score(item: &QueueItem, boost: &PriorityBoost, now: SystemTime) -> f64 {
    let wait_minutes = now
        .duration_since(item.created_at)
        .unwrap_or_default()
        .as_secs_f64()
        / 60.0;

    f64::from(item.priority.weight())
        + f64::from(item.attempts) * boost.retry_count
        + wait_minutes * boost.wait_time
}

/// Total queue order: pending items first, then descending score, ties
/// broken by ascending `scheduled_for` (FIFO within equal score)
#[must_use]
pub fn compare(a: &QueueItem, b: &QueueItem) -> Ordering {
    let a_pending = a.status == SendStatus::Pending;
    let b_pending = b.status == SendStatus::Pending;

    b_pending
        .cmp(&a_pending)
        .then_with(|| b.dynamic_priority.total_cmp(&a.dynamic_priority))
        .then_with(|| a.scheduled_for.cmp(&b.scheduled_for))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use missive_common::Priority;
    use pretty_assertions::assert_eq;

    use crate::types::MessagePayload;

    use super::*;

    fn item(priority: Priority) -> QueueItem {
        QueueItem::new(
            MessagePayload::Raw {
                to: "customer@example.com".to_string(),
                subject: "subject".to_string(),
                html: "<p>body</p>".to_string(),
                text: None,
            },
            priority,
            3,
            None,
            None,
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_tier_weight_dominates_fresh_items() {
        let boost = PriorityBoost::default();
        let now = SystemTime::now();

        let critical = score(&item(Priority::Critical), &boost, now);
        let high = score(&item(Priority::High), &boost, now);
        let low = score(&item(Priority::Low), &boost, now);

        assert!(critical > high);
        assert!(high > low);
    }

    #[test]
    fn test_retry_boost_raises_score() {
        let boost = PriorityBoost::default();
        let now = SystemTime::now();

        let fresh = item(Priority::Medium);
        let mut retried = item(Priority::Medium);
        retried.attempts = 2;

        assert!(score(&retried, &boost, now) > score(&fresh, &boost, now));
    }

    #[test]
    fn test_wait_boost_lifts_old_low_over_fresh_high() {
        let boost = PriorityBoost {
            retry_count: 5.0,
            wait_time: 1.0,
        };
        let now = SystemTime::now();

        let mut old_low = item(Priority::Low);
        // Waiting 100 minutes gains 100 points, overtaking a fresh high (100)
        old_low.created_at = now - Duration::from_secs(100 * 60 + 60);

        let fresh_high = item(Priority::High);

        assert!(score(&old_low, &boost, now) > score(&fresh_high, &boost, now));
    }

    #[test]
    fn test_ordering_pending_first_then_score_then_fifo() {
        let now = SystemTime::now();
        let boost = PriorityBoost::default();

        let mut done = item(Priority::Critical);
        done.status = missive_common::SendStatus::Completed;

        let mut high = item(Priority::High);
        high.dynamic_priority = score(&high, &boost, now);

        let mut low_early = item(Priority::Low);
        low_early.scheduled_for = now - Duration::from_secs(10);
        low_early.dynamic_priority = 1.0;

        let mut low_late = item(Priority::Low);
        low_late.scheduled_for = now;
        low_late.dynamic_priority = 1.0;

        let mut items = vec![done.clone(), low_late.clone(), low_early.clone(), high.clone()];
        items.sort_by(compare);

        assert_eq!(items[0].id, high.id);
        assert_eq!(items[1].id, low_early.id);
        assert_eq!(items[2].id, low_late.id);
        assert_eq!(items[3].id, done.id);
    }
}
