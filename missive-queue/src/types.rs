//! Type definitions for the delivery queue

use std::time::SystemTime;

use missive_common::{Domain, Priority, SendStatus};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Identifier for a queued message
///
/// A globally unique ULID: lexicographically sortable by creation time and
/// collision-resistant, so ids double as stable creation-order keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId {
    id: ulid::Ulid,
}

impl MessageId {
    /// Create a message ID from an existing ULID
    #[must_use]
    pub const fn new(id: ulid::Ulid) -> Self {
        Self { id }
    }

    /// Generate a new unique message ID
    #[must_use]
    pub fn generate() -> Self {
        Self {
            id: ulid::Ulid::new(),
        }
    }

    /// Get the underlying ULID
    #[must_use]
    pub const fn ulid(&self) -> ulid::Ulid {
        self.id
    }

    /// Get the timestamp (milliseconds since Unix epoch) encoded in this ID
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.id.timestamp_ms()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl std::str::FromStr for MessageId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            id: ulid::Ulid::from_string(s)?,
        })
    }
}

impl serde::Serialize for MessageId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.id.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let id = ulid::Ulid::from_string(&s).map_err(serde::de::Error::custom)?;
        Ok(Self { id })
    }
}

/// Message content handed to the transmitter
///
/// Either fully rendered content or a reference to a provider-side template
/// with its substitution data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagePayload {
    Raw {
        to: String,
        subject: String,
        html: String,
        #[serde(default)]
        text: Option<String>,
    },
    Templated {
        to: String,
        template: String,
        data: serde_json::Value,
    },
}

impl MessagePayload {
    /// The recipient address of this payload
    #[must_use]
    pub fn recipient(&self) -> &str {
        match self {
            Self::Raw { to, .. } | Self::Templated { to, .. } => to,
        }
    }

    /// Replace the recipient address (used by resend overrides)
    pub fn set_recipient(&mut self, recipient: String) {
        match self {
            Self::Raw { to, .. } | Self::Templated { to, .. } => *to = recipient,
        }
    }

    /// The recipient's domain, lowercased
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRecipient`] when the recipient
    /// address has no usable domain part.
    pub fn recipient_domain(&self) -> Result<Domain, ValidationError> {
        Domain::from_address(self.recipient())
            .ok_or_else(|| ValidationError::InvalidRecipient(self.recipient().to_string()))
    }

    /// Structural validation applied at enqueue time and on snapshot restore
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] describing the first structural problem
    /// found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.recipient_domain()?;

        match self {
            Self::Raw { subject, html, .. } => {
                if subject.trim().is_empty() {
                    return Err(ValidationError::EmptySubject);
                }
                if html.trim().is_empty() {
                    return Err(ValidationError::EmptyBody);
                }
            }
            Self::Templated { template, .. } => {
                if template.trim().is_empty() {
                    return Err(ValidationError::EmptyTemplate);
                }
            }
        }

        Ok(())
    }
}

/// Result returned by the transmitter for an accepted send
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Provider-assigned identifier for the delivered message, when the
    /// transport reports one
    pub provider_message_id: Option<String>,
}

/// One pending, in-flight or terminal send request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: MessageId,
    pub payload: MessagePayload,
    pub priority: Priority,
    /// Attempts made so far; never exceeds `max_attempts`
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: SystemTime,
    /// Earliest time this item becomes eligible for dispatch
    pub scheduled_for: SystemTime,
    /// Earliest retry time; always >= `scheduled_for`
    pub next_attempt: SystemTime,
    pub status: SendStatus,
    /// Scheduler ranking score; only meaningful while `status` is pending
    pub dynamic_priority: f64,
    pub recipient_domain: Domain,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Populated once the transmitter accepts the message
    #[serde(default)]
    pub result: Option<SendReceipt>,
    /// Last transport error observed for this item
    #[serde(default)]
    pub error: Option<String>,
}

impl QueueItem {
    /// Create a new pending item due at `scheduled_for`
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the payload fails structural
    /// validation.
    pub fn new(
        payload: MessagePayload,
        priority: Priority,
        max_attempts: u32,
        scheduled_for: Option<SystemTime>,
        idempotency_key: Option<String>,
        tags: Vec<String>,
    ) -> Result<Self, ValidationError> {
        payload.validate()?;
        let recipient_domain = payload.recipient_domain()?;

        let now = SystemTime::now();
        let scheduled_for = scheduled_for.unwrap_or(now);

        Ok(Self {
            id: MessageId::generate(),
            payload,
            priority,
            attempts: 0,
            // A zero attempt budget would make the lifecycle unsatisfiable
            max_attempts: max_attempts.max(1),
            created_at: now,
            scheduled_for,
            next_attempt: scheduled_for,
            status: SendStatus::Pending,
            dynamic_priority: f64::from(priority.weight()),
            recipient_domain,
            idempotency_key,
            tags,
            result: None,
            error: None,
        })
    }

    /// Whether this item is due for dispatch at `now`
    #[must_use]
    pub fn is_due(&self, now: SystemTime) -> bool {
        self.scheduled_for <= now && self.next_attempt <= now
    }
}
