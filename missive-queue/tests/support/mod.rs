//! Test support: a scripted in-process transmitter
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::{
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use missive_queue::{
    EnqueueOptions, MessagePayload, QueueConfig, SendError, SendReceipt, TierValues, Transmitter,
    TransmitterHealth,
};

/// One observed send
#[derive(Debug, Clone)]
pub struct SendRecord {
    pub to: String,
    pub at: Instant,
}

/// A transmitter fake that records every send and can be scripted to fail
#[derive(Debug)]
pub struct MockTransmitter {
    /// Number of initial sends that should fail before succeeding
    fail_first: AtomicU32,
    /// Fail every send unconditionally
    fail_always: AtomicBool,
    /// Simulated transport latency
    latency: Duration,
    healthy: AtomicBool,
    sends: Mutex<Vec<SendRecord>>,
    counter: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MockTransmitter {
    fn default() -> Self {
        Self {
            fail_first: AtomicU32::new(0),
            fail_always: AtomicBool::new(false),
            latency: Duration::ZERO,
            healthy: AtomicBool::new(true),
            sends: Mutex::new(Vec::new()),
            counter: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl MockTransmitter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            ..Self::default()
        })
    }

    /// Fail the next `n` sends with a transient transport error
    pub fn fail_first(self: Arc<Self>, n: u32) -> Arc<Self> {
        self.fail_first.store(n, Ordering::SeqCst);
        self
    }

    /// Fail every send
    pub fn fail_always(self: Arc<Self>) -> Arc<Self> {
        self.fail_always.store(true, Ordering::SeqCst);
        self
    }

    /// Flip the unconditional-failure switch
    pub fn set_fail_always(&self, fail: bool) {
        self.fail_always.store(fail, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Every send observed so far, in arrival order
    pub fn sends(&self) -> Vec<SendRecord> {
        self.sends.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().unwrap().len()
    }

    /// The most sends that were ever in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn transmit(&self, to: &str) -> Result<SendReceipt, SendError> {
        self.sends.lock().unwrap().push(SendRecord {
            to: to.to_string(),
            at: Instant::now(),
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_always.load(Ordering::SeqCst) {
            return Err(SendError::Unavailable("scripted failure".to_string()));
        }

        let remaining = self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if remaining {
            return Err(SendError::Unavailable("scripted transient failure".to_string()));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(SendReceipt {
            provider_message_id: Some(format!("mock-{n}")),
        })
    }
}

#[async_trait]
impl Transmitter for MockTransmitter {
    async fn send_raw(
        &self,
        to: &str,
        _subject: &str,
        _html: &str,
        _text: Option<&str>,
    ) -> Result<SendReceipt, SendError> {
        self.transmit(to).await
    }

    async fn send_templated(
        &self,
        to: &str,
        _template: &str,
        _data: &serde_json::Value,
    ) -> Result<SendReceipt, SendError> {
        self.transmit(to).await
    }

    async fn health(&self) -> TransmitterHealth {
        if self.healthy.load(Ordering::SeqCst) {
            TransmitterHealth::healthy()
        } else {
            TransmitterHealth::unhealthy("scripted outage")
        }
    }
}

/// A raw payload addressed to `to`
pub fn raw_payload(to: &str) -> MessagePayload {
    MessagePayload::Raw {
        to: to.to_string(),
        subject: "Your order has shipped".to_string(),
        html: "<p>It is on its way.</p>".to_string(),
        text: Some("It is on its way.".to_string()),
    }
}

/// Enqueue options with the given attempt budget
pub fn attempts(max_attempts: u32) -> EnqueueOptions {
    EnqueueOptions {
        max_attempts,
        ..Default::default()
    }
}

/// A configuration with no tier limits and fast intervals, suitable for
/// driving ticks manually in tests
pub fn unlimited_config() -> QueueConfig {
    QueueConfig {
        max_concurrent: 10,
        batch_size: 10,
        rate_limits: TierValues {
            critical: 0,
            high: 0,
            medium: 0,
            low: 0,
        },
        testing_mode: true,
        testing_interval_ms: 0,
        retry_delays_ms: vec![50],
        ..Default::default()
    }
}
