//! Per-recipient-domain throttling using the token bucket algorithm
//!
//! Independent of the tier rate limits: a burst of marketing mail to one
//! mailbox provider must not be able to monopolize the outbound pipe, and
//! providers that throttle aggressively can be capped individually.
//!
//! # Token Bucket
//!
//! - Capacity equals the configured per-second limit
//! - Tokens refill at `limit` per second
//! - Each send consumes one token
//! - A domain with less than one token is skipped until it refills
//!
//! Domains without a configured limit are not throttled.

use std::{sync::Arc, time::Instant};

use ahash::AHashMap;
use dashmap::DashMap;
use missive_common::Domain;

/// Token bucket for a single domain
#[derive(Debug)]
struct TokenBucket {
    /// Current number of tokens
    tokens: f64,
    /// Maximum tokens (burst size)
    capacity: f64,
    /// Tokens added per second
    refill_rate: f64,
    /// Last time tokens were added
    last_refill: Instant,
}

impl TokenBucket {
    fn new(limit: u32) -> Self {
        let capacity = f64::from(limit);
        Self {
            tokens: capacity,
            capacity,
            refill_rate: capacity,
            last_refill: Instant::now(),
        }
    }

    /// Refill tokens based on elapsed time
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        let tokens_to_add = elapsed * self.refill_rate;
        self.tokens = (self.tokens + tokens_to_add).min(self.capacity);
        self.last_refill = now;
    }

    fn has_token(&mut self) -> bool {
        self.refill();
        self.tokens >= 1.0
    }

    fn consume(&mut self) {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
        }
    }
}

/// Per-domain throttle manager
#[derive(Debug)]
pub struct DomainThrottle {
    /// Configured limits, tokens per second per domain
    limits: AHashMap<String, u32>,
    /// Lazily created per-domain buckets
    buckets: DashMap<Domain, Arc<parking_lot::Mutex<TokenBucket>>>,
}

impl DomainThrottle {
    /// Create a throttle from the configured domain→limit map
    #[must_use]
    pub fn new(limits: AHashMap<String, u32>) -> Self {
        Self {
            limits,
            buckets: DashMap::new(),
        }
    }

    fn bucket(&self, domain: &Domain, limit: u32) -> Arc<parking_lot::Mutex<TokenBucket>> {
        self.buckets
            .entry(domain.clone())
            .or_insert_with(|| Arc::new(parking_lot::Mutex::new(TokenBucket::new(limit))))
            .clone()
    }

    /// Whether a send to `domain` is currently allowed; consumes nothing
    #[must_use]
    pub fn check(&self, domain: &Domain) -> bool {
        let Some(&limit) = self.limits.get(domain.as_str()) else {
            return true;
        };

        self.bucket(domain, limit).lock().has_token()
    }

    /// Consume one token for a send to `domain`
    pub fn consume(&self, domain: &Domain) {
        let Some(&limit) = self.limits.get(domain.as_str()) else {
            return;
        };

        self.bucket(domain, limit).lock().consume();
    }

    /// Currently available tokens for `domain` (for stats/debugging)
    #[must_use]
    pub fn available_tokens(&self, domain: &Domain) -> Option<f64> {
        self.buckets.get(domain).map(|bucket| {
            let mut bucket = bucket.lock();
            bucket.refill();
            bucket.tokens
        })
    }
}
