//! The public queue service
//!
//! [`MailQueue`] is the single parameterized entry point the storefront
//! embeds: it owns the queue state and the limiter components, exposes the
//! caller-facing operations, and is driven by the dispatch loop in
//! [`MailQueue::serve`]. No caller-facing operation ever blocks on network
//! I/O; delivery outcomes are observed by polling [`MailQueue::delivery_state`].

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::SystemTime,
};

use missive_common::{DeliveryState, Priority, SendStatus};
use missive_store::KeyValueStore;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::{
    config::QueueConfig,
    error::QueueError,
    persistence,
    queue::SendQueue,
    rate_limiter::TierRateLimiter,
    retry::RetryPolicy,
    throttle::DomainThrottle,
    transmitter::{Transmitter, TransmitterHealth},
    types::{MessageId, MessagePayload, QueueItem},
};

/// Per-call knobs for [`MailQueue::enqueue`]
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    pub max_attempts: u32,
    /// Earliest dispatch time; `None` means due immediately
    pub scheduled_for: Option<SystemTime>,
    pub idempotency_key: Option<String>,
    pub tags: Vec<String>,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            scheduled_for: None,
            idempotency_key: None,
            tags: Vec::new(),
        }
    }
}

/// Provisional acknowledgment returned by an accepted enqueue
#[derive(Debug, Clone, Serialize)]
pub struct EnqueueReceipt {
    pub id: MessageId,
    /// `Scheduled` or `Queued` at acceptance time; the delivery outcome is
    /// observed later through the status API
    pub state: DeliveryState,
}

/// Item counts per lifecycle status
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Item counts per priority tier
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PriorityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Aggregate queue statistics
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    /// Items currently held, terminal included
    pub total: usize,
    pub by_status: StatusCounts,
    pub by_priority: PriorityCounts,
    /// Transmitter calls in flight right now
    pub active_workers: usize,
    /// Idempotency keys currently cached
    pub idempotency_keys: usize,
}

/// Queue statistics plus the transmitter's own health
#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    pub stats: QueueStats,
    pub transmitter: TransmitterHealth,
}

/// The message delivery queue
#[derive(Debug)]
pub struct MailQueue {
    pub(crate) config: QueueConfig,
    pub(crate) queue: SendQueue,
    pub(crate) limiter: TierRateLimiter,
    pub(crate) throttle: DomainThrottle,
    pub(crate) retry: RetryPolicy,
    pub(crate) transmitter: Arc<dyn Transmitter>,
    pub(crate) store: Arc<dyn KeyValueStore>,
    pub(crate) nudge: Notify,
    pub(crate) active: AtomicUsize,
}

impl MailQueue {
    /// Build a queue service from configuration and its two collaborators
    #[must_use]
    pub fn new(
        config: QueueConfig,
        transmitter: Arc<dyn Transmitter>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let limiter = TierRateLimiter::new(&config);
        let throttle = DomainThrottle::new(config.domain_limits.clone());
        let retry = RetryPolicy::new(&config.retry_delays_ms);

        Self {
            config,
            queue: SendQueue::new(),
            limiter,
            throttle,
            retry,
            transmitter,
            store,
            nudge: Notify::new(),
            active: AtomicUsize::new(0),
        }
    }

    /// Reload the persisted snapshot into the queue.
    ///
    /// Call once at startup, before [`MailQueue::serve`] starts ticking.
    ///
    /// # Errors
    ///
    /// Propagates store and snapshot-format failures; individually invalid
    /// entries are dropped with a warning instead.
    pub async fn restore(&self) -> Result<usize, QueueError> {
        let admitted =
            persistence::restore(&self.queue, self.store.as_ref(), &self.config.persistence_key)
                .await?;
        if admitted > 0 {
            info!(admitted, "Restored in-flight queue state");
        }
        Ok(admitted)
    }

    /// Accept a send request.
    ///
    /// Returns immediately with a provisional acknowledgment referencing
    /// the new id and nudges the dispatcher.
    ///
    /// # Errors
    ///
    /// [`QueueError::Validation`], [`QueueError::Capacity`] or
    /// [`QueueError::Duplicate`]; rejected requests never enter the queue.
    pub fn enqueue(
        &self,
        payload: MessagePayload,
        priority: Priority,
        opts: EnqueueOptions,
    ) -> Result<EnqueueReceipt, QueueError> {
        let item = QueueItem::new(
            payload,
            priority,
            opts.max_attempts,
            opts.scheduled_for,
            opts.idempotency_key,
            opts.tags,
        )?;

        let id = item.id;
        let state = if item.scheduled_for > SystemTime::now() {
            DeliveryState::Scheduled
        } else {
            DeliveryState::Queued
        };

        self.queue.insert(item, self.config.max_queue_size)?;
        self.nudge.notify_one();

        debug!(%id, %priority, ?state, "Accepted message");
        Ok(EnqueueReceipt { id, state })
    }

    /// Accept fully rendered content.
    ///
    /// # Errors
    ///
    /// Same as [`MailQueue::enqueue`].
    pub fn enqueue_raw(
        &self,
        to: impl Into<String>,
        subject: impl Into<String>,
        html: impl Into<String>,
        text: Option<String>,
        priority: Priority,
        opts: EnqueueOptions,
    ) -> Result<EnqueueReceipt, QueueError> {
        let payload = MessagePayload::Raw {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
            text,
        };
        self.enqueue(payload, priority, opts)
    }

    /// Accept a provider-side template with substitution data.
    ///
    /// # Errors
    ///
    /// Same as [`MailQueue::enqueue`].
    pub fn enqueue_templated(
        &self,
        to: impl Into<String>,
        template: impl Into<String>,
        data: serde_json::Value,
        priority: Priority,
        opts: EnqueueOptions,
    ) -> Result<EnqueueReceipt, QueueError> {
        let payload = MessagePayload::Templated {
            to: to.into(),
            template: template.into(),
            data,
        };
        self.enqueue(payload, priority, opts)
    }

    /// Accept a send request due no earlier than `at`.
    ///
    /// # Errors
    ///
    /// Same as [`MailQueue::enqueue`].
    pub fn schedule(
        &self,
        payload: MessagePayload,
        at: SystemTime,
        priority: Priority,
        mut opts: EnqueueOptions,
    ) -> Result<EnqueueReceipt, QueueError> {
        opts.scheduled_for = Some(at);
        self.enqueue(payload, priority, opts)
    }

    /// Cancel a message that has not been selected for dispatch yet.
    ///
    /// # Errors
    ///
    /// [`QueueError::NotFound`] or [`QueueError::InvalidTransition`] naming
    /// the current status; in-flight sends are never interrupted.
    pub fn cancel(&self, id: &MessageId) -> Result<(), QueueError> {
        self.queue.cancel(id)?;
        debug!(%id, "Cancelled message");
        Ok(())
    }

    /// Clone a terminal message into a fresh pending one.
    ///
    /// The new item starts with zero attempts and a new id; the original's
    /// idempotency key is not carried over. `new_recipient` optionally
    /// replaces the recipient address.
    ///
    /// # Errors
    ///
    /// [`QueueError::NotFound`], [`QueueError::InvalidTransition`] when the
    /// original is still active, or validation/capacity rejections for the
    /// cloned item.
    pub fn resend(
        &self,
        id: &MessageId,
        new_recipient: Option<String>,
    ) -> Result<EnqueueReceipt, QueueError> {
        let original = self.queue.get(id).ok_or(QueueError::NotFound(*id))?;

        if !original.status.is_terminal() {
            return Err(QueueError::InvalidTransition {
                operation: "resend",
                id: *id,
                status: original.status,
            });
        }

        let mut payload = original.payload;
        if let Some(recipient) = new_recipient {
            payload.set_recipient(recipient);
        }

        let opts = EnqueueOptions {
            max_attempts: original.max_attempts,
            scheduled_for: None,
            idempotency_key: None,
            tags: original.tags,
        };

        let receipt = self.enqueue(payload, original.priority, opts)?;
        debug!(original = %id, resent = %receipt.id, "Resent message");
        Ok(receipt)
    }

    /// The externally visible delivery state of a message.
    ///
    /// # Errors
    ///
    /// [`QueueError::NotFound`] for unknown ids.
    pub fn delivery_state(&self, id: &MessageId) -> Result<DeliveryState, QueueError> {
        let item = self.queue.get(id).ok_or(QueueError::NotFound(*id))?;

        let state = match item.status {
            SendStatus::Pending => {
                if item.scheduled_for > SystemTime::now() {
                    DeliveryState::Scheduled
                } else {
                    DeliveryState::Queued
                }
            }
            SendStatus::Processing => DeliveryState::Sending,
            SendStatus::Completed => DeliveryState::Sent,
            SendStatus::Failed => DeliveryState::Failed,
            SendStatus::Cancelled => DeliveryState::Cancelled,
        };

        Ok(state)
    }

    /// The full queue item, including result/error detail
    #[must_use]
    pub fn get_message(&self, id: &MessageId) -> Option<QueueItem> {
        self.queue.get(id)
    }

    /// Aggregate queue statistics
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let (by_status, by_priority) = self.queue.count_by();

        let status_count = |status: SendStatus| by_status.get(&status).copied().unwrap_or(0);
        let priority_count = |tier: Priority| by_priority.get(&tier).copied().unwrap_or(0);

        QueueStats {
            total: self.queue.len(),
            by_status: StatusCounts {
                pending: status_count(SendStatus::Pending),
                processing: status_count(SendStatus::Processing),
                completed: status_count(SendStatus::Completed),
                failed: status_count(SendStatus::Failed),
                cancelled: status_count(SendStatus::Cancelled),
            },
            by_priority: PriorityCounts {
                critical: priority_count(Priority::Critical),
                high: priority_count(Priority::High),
                medium: priority_count(Priority::Medium),
                low: priority_count(Priority::Low),
            },
            active_workers: self.active.load(Ordering::SeqCst),
            idempotency_keys: self.queue.idempotency_len(),
        }
    }

    /// Queue statistics plus the transmitter's health passthrough
    pub async fn health(&self) -> QueueHealth {
        QueueHealth {
            stats: self.stats(),
            transmitter: self.transmitter.health().await,
        }
    }

    /// Write a snapshot of all in-flight work to the durable store now.
    ///
    /// The dispatcher does this on its own cadence; call it directly to
    /// flush before a planned shutdown. Returns the number of items
    /// captured.
    ///
    /// # Errors
    ///
    /// Propagates store and serialization failures.
    pub async fn persist(&self) -> Result<usize, QueueError> {
        persistence::snapshot(&self.queue, self.store.as_ref(), &self.config.persistence_key).await
    }

    /// Run one dispatch tick: refresh ordering, select eligible items and
    /// deliver them, then apply the outcomes.
    ///
    /// The serve loop calls this on every tick; embedders that drive the
    /// queue manually (tests, single-shot jobs) can call it directly.
    /// Returns the number of items dispatched.
    ///
    /// # Errors
    ///
    /// Propagates snapshot persistence failures; send failures are handled
    /// by the retry manager and never surface here.
    pub async fn process_once(&self) -> Result<usize, QueueError> {
        crate::dispatcher::process::run_tick(self).await
    }

    /// The queue configuration this service was built with
    #[must_use]
    pub const fn config(&self) -> &QueueConfig {
        &self.config
    }
}
