//! Typed error handling for queue operations.
//!
//! Two families live here:
//! - [`QueueError`]: synchronous rejections surfaced directly to API
//!   callers (validation, capacity, duplicates, invalid transitions).
//! - [`SendError`]: transport failures reported by the transmitter. These
//!   never surface as errors to callers: the retry manager absorbs them
//!   until the item's attempt budget is exhausted, at which point the item
//!   is marked failed and the error becomes visible through the status API.

use missive_common::SendStatus;
use thiserror::Error;

use crate::types::MessageId;

/// Structural payload validation failures, rejected at enqueue.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Recipient address has no usable domain part.
    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),

    /// Raw message with an empty subject line.
    #[error("Raw message requires a non-empty subject")]
    EmptySubject,

    /// Raw message with an empty html body.
    #[error("Raw message requires html content")]
    EmptyBody,

    /// Templated message with an empty template name.
    #[error("Template name must not be empty")]
    EmptyTemplate,
}

/// Top-level queue error type.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Malformed payload, rejected at enqueue and never queued.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Queue is at capacity and the message is not critical-priority.
    #[error("Queue is full ({len}/{max}), rejecting non-critical message")]
    Capacity { len: usize, max: usize },

    /// The idempotency key is already bound to an active message.
    #[error("Idempotency key {key:?} already bound to active message {id}")]
    Duplicate { key: String, id: MessageId },

    /// The requested lifecycle transition is not allowed from the item's
    /// current status.
    #[error("Cannot {operation} message {id}: status is {status}")]
    InvalidTransition {
        operation: &'static str,
        id: MessageId,
        status: SendStatus,
    },

    /// No item with this id exists in the queue.
    #[error("Message not found: {0}")]
    NotFound(MessageId),

    /// The durable store collaborator failed.
    #[error(transparent)]
    Store(#[from] missive_store::StoreError),

    /// Snapshot encoding or decoding failed.
    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl QueueError {
    /// Returns `true` for rejections the caller can fix by changing the
    /// request (as opposed to infrastructure failures).
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Capacity { .. }
                | Self::Duplicate { .. }
                | Self::InvalidTransition { .. }
                | Self::NotFound(_)
        )
    }
}

/// Transport failure reported by the transmitter collaborator.
///
/// Every variant is treated as transient: the retry manager reschedules the
/// item until its attempt budget runs out.
#[derive(Debug, Error)]
pub enum SendError {
    /// The transport could not be reached or refused the connection.
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// The transport rejected this message.
    #[error("Send rejected: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections() {
        let err = QueueError::Capacity { len: 10, max: 10 };
        assert!(err.is_rejection());

        let err = QueueError::Validation(ValidationError::EmptySubject);
        assert!(err.is_rejection());

        let err = QueueError::Store(missive_store::StoreError::Internal("backend down".into()));
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = QueueError::InvalidTransition {
            operation: "cancel",
            id: MessageId::generate(),
            status: SendStatus::Processing,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("cancel"));
        assert!(rendered.contains("processing"));
    }

    #[test]
    fn test_send_error_display() {
        let err = SendError::Unavailable("connection refused".to_string());
        assert_eq!(err.to_string(), "Transport unavailable: connection refused");
    }
}
