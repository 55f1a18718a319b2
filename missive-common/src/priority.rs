//! Priority tiers for queued messages
//!
//! Each tier carries a fixed base weight used by the scheduler and owns its
//! own rate-limit and inter-send interval buckets.

use core::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// The priority tier of a queued message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Order confirmations, password resets: dispatched ahead of everything
    /// else and exempt from the queue capacity gate.
    Critical,
    High,
    Medium,
    /// Bulk marketing traffic.
    Low,
}

impl Priority {
    /// All tiers, highest first
    pub const ALL: [Self; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    /// Base scheduling weight for this tier
    #[must_use]
    pub const fn weight(self) -> u32 {
        match self {
            Self::Critical => 1000,
            Self::High => 100,
            Self::Medium => 10,
            Self::Low => 1,
        }
    }

    /// Dense index for per-tier state tables
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl Display for Priority {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(fmt, "{}", self.as_str())
    }
}
