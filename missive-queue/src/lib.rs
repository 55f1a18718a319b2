//! Message delivery queue for outbound storefront mail
//!
//! This crate provides the delivery core the storefront embeds to send
//! transactional and marketing messages:
//! - priority-ordered queueing with a dynamic anti-starvation score
//! - per-tier send-rate limits and per-recipient-domain throttling
//! - bounded-concurrency dispatch to a pluggable transmitter
//! - table-based retry with backoff and terminal failure tracking
//! - periodic best-effort snapshots to a durable key-value collaborator
//! - idempotency-key deduplication and terminal-item cleanup

mod config;
mod dispatcher;
mod error;
mod persistence;
mod queue;
mod rate_limiter;
mod retry;
mod scheduler;
mod service;
mod throttle;
mod transmitter;
mod types;

// Re-export shared vocabulary types
pub use missive_common::{DeliveryState, Domain, Priority, SendStatus, Signal};
// Re-export configuration types
pub use config::{PriorityBoost, QueueConfig, TierValues};
// Re-export error types
pub use error::{QueueError, SendError, ValidationError};
// Re-export limiter components
pub use rate_limiter::TierRateLimiter;
pub use retry::RetryPolicy;
pub use throttle::DomainThrottle;
// Re-export the service surface
pub use service::{
    EnqueueOptions, EnqueueReceipt, MailQueue, PriorityCounts, QueueHealth, QueueStats,
    StatusCounts,
};
pub use transmitter::{Transmitter, TransmitterHealth};
pub use types::{MessageId, MessagePayload, QueueItem, SendReceipt};
