//! Collaborator trait for the outbound mail transport
//!
//! The queue never talks to a provider directly: the storefront wires in a
//! [`Transmitter`] implementation (provider HTTP API, SMTP relay, a capture
//! fake in tests) and the dispatcher treats every call as an opaque
//! asynchronous operation. Transport failures are absorbed and retried by
//! the queue; the transmitter's own health is proxied into the queue's
//! health report.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{error::SendError, types::SendReceipt};

/// Health snapshot reported by the transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransmitterHealth {
    pub healthy: bool,
    /// Transport-specific detail, e.g. the failing upstream
    #[serde(default)]
    pub detail: Option<String>,
}

impl TransmitterHealth {
    /// A healthy report with no detail
    #[must_use]
    pub const fn healthy() -> Self {
        Self {
            healthy: true,
            detail: None,
        }
    }

    /// An unhealthy report carrying a reason
    #[must_use]
    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            healthy: false,
            detail: Some(detail.into()),
        }
    }
}

/// Outbound mail transport collaborator
#[async_trait]
pub trait Transmitter: fmt::Debug + Send + Sync {
    /// Deliver fully rendered content.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] when the transport fails or rejects the
    /// message; the queue retries until the item's attempt budget runs out.
    async fn send_raw(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        text: Option<&str>,
    ) -> Result<SendReceipt, SendError>;

    /// Deliver a provider-side template with substitution data.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] when the transport fails or rejects the
    /// message; the queue retries until the item's attempt budget runs out.
    async fn send_templated(
        &self,
        to: &str,
        template: &str,
        data: &serde_json::Value,
    ) -> Result<SendReceipt, SendError>;

    /// Current transport health, proxied into the queue's health report
    async fn health(&self) -> TransmitterHealth;
}
