//! Per-tier send-rate enforcement
//!
//! Each priority tier carries two independent gates, both of which must
//! pass before an item is dispatched:
//!
//! - a sliding one-second window capping sends per second (0 = unlimited)
//! - a minimum interval between consecutive sends
//!
//! State is owned by this component and only reachable through method
//! calls, so a dispatch pass and a concurrent enqueue can never race on the
//! counters.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use missive_common::Priority;
use parking_lot::Mutex;

use crate::config::QueueConfig;

const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
struct TierLimit {
    /// Sends allowed per rolling second; 0 disables the window gate
    per_second: u32,
    /// Minimum gap between consecutive sends; zero disables the gate
    min_interval: Duration,
}

#[derive(Debug, Default)]
struct TierState {
    /// Instants of sends recorded within the current window
    window: VecDeque<Instant>,
    last_send: Option<Instant>,
}

impl TierState {
    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.window.front() {
            if now.duration_since(*front) >= WINDOW {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Per-tier rate limiter
#[derive(Debug)]
pub struct TierRateLimiter {
    limits: [TierLimit; 4],
    states: Mutex<[TierState; 4]>,
}

impl TierRateLimiter {
    /// Build the limiter from queue configuration
    #[must_use]
    pub fn new(config: &QueueConfig) -> Self {
        let limits = Priority::ALL.map(|tier| TierLimit {
            per_second: config.rate_limits.get(tier),
            min_interval: config.send_interval(tier),
        });

        Self {
            limits,
            states: Mutex::new(Default::default()),
        }
    }

    /// Whether `tier` may send right now; consumes nothing
    #[must_use]
    pub fn check(&self, tier: Priority) -> bool {
        let limit = self.limits[tier.index()];
        let now = Instant::now();
        let mut states = self.states.lock();
        let state = &mut states[tier.index()];
        state.prune(now);

        if limit.per_second > 0 && state.window.len() >= limit.per_second as usize {
            return false;
        }

        if !limit.min_interval.is_zero()
            && let Some(last) = state.last_send
            && now.duration_since(last) < limit.min_interval
        {
            return false;
        }

        true
    }

    /// Record a dispatch for `tier`: consumes a window slot and stamps the
    /// last-send time
    pub fn record(&self, tier: Priority) {
        let now = Instant::now();
        let mut states = self.states.lock();
        let state = &mut states[tier.index()];
        state.prune(now);
        state.window.push_back(now);
        state.last_send = Some(now);
    }

    /// Re-stamp the last-send time once a send actually completed, so the
    /// inter-send interval measures from completion
    pub fn mark_sent(&self, tier: Priority) {
        let mut states = self.states.lock();
        states[tier.index()].last_send = Some(Instant::now());
    }

    /// Sends recorded for `tier` in the current window (for stats/debugging)
    #[must_use]
    pub fn window_len(&self, tier: Priority) -> usize {
        let now = Instant::now();
        let mut states = self.states.lock();
        let state = &mut states[tier.index()];
        state.prune(now);
        state.window.len()
    }
}
