//! Queue item lifecycle states
//!
//! `SendStatus` is the internal lifecycle tracked by the queue core;
//! `DeliveryState` is the external view reported to API callers, which
//! additionally distinguishes not-yet-due scheduled messages.

use core::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Internal lifecycle state of a queued message
///
/// Transitions: `Pending -> Processing`, `Processing -> Completed`,
/// `Processing -> Failed`, `Processing -> Pending` (retryable failure),
/// `Pending -> Cancelled`. `Completed`, `Failed` and `Cancelled` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl SendStatus {
    /// A terminal item can never transition again
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Active items are the ones an idempotency key may be bound to
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Display for SendStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(fmt, "{}", self.as_str())
    }
}

/// External delivery state reported by the status API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    /// Pending with a `scheduled_for` still in the future
    Scheduled,
    /// Pending and due
    Queued,
    Sending,
    Sent,
    Failed,
    Cancelled,
}

impl Display for DeliveryState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let s = match self {
            Self::Scheduled => "scheduled",
            Self::Queued => "queued",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(fmt, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(SendStatus::Completed.is_terminal());
        assert!(SendStatus::Failed.is_terminal());
        assert!(SendStatus::Cancelled.is_terminal());
        assert!(!SendStatus::Pending.is_terminal());
        assert!(!SendStatus::Processing.is_terminal());
    }

    #[test]
    fn test_active_states() {
        assert!(SendStatus::Pending.is_active());
        assert!(SendStatus::Processing.is_active());
        assert!(!SendStatus::Completed.is_active());
    }

    #[test]
    fn test_display() {
        assert_eq!(SendStatus::Processing.to_string(), "processing");
        assert_eq!(DeliveryState::Scheduled.to_string(), "scheduled");
    }
}
