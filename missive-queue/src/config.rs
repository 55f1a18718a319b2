//! Queue configuration
//!
//! Loaded once at startup by the embedding process, either deserialized
//! from the storefront's own configuration tree or read from a RON file via
//! [`QueueConfig::discover`].

use std::{path::Path, time::Duration};

use ahash::AHashMap;
use missive_common::Priority;
use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// One value per priority tier
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TierValues<T> {
    pub critical: T,
    pub high: T,
    pub medium: T,
    pub low: T,
}

impl<T: Copy> TierValues<T> {
    /// The value configured for `tier`
    pub fn get(&self, tier: Priority) -> T {
        match tier {
            Priority::Critical => self.critical,
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

/// Weights applied by the scheduler on top of the tier base weight
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriorityBoost {
    /// Score added per delivery attempt already made
    #[serde(default = "default_retry_boost")]
    pub retry_count: f64,

    /// Score added per minute an item has been waiting
    #[serde(default = "default_wait_boost")]
    pub wait_time: f64,
}

impl Default for PriorityBoost {
    fn default() -> Self {
        Self {
            retry_count: default_retry_boost(),
            wait_time: default_wait_boost(),
        }
    }
}

const fn default_retry_boost() -> f64 {
    5.0
}

const fn default_wait_boost() -> f64 {
    1.0
}

const fn default_max_concurrent() -> usize {
    5
}

const fn default_rate_limits() -> TierValues<u32> {
    // Sends per rolling second; 0 = unlimited
    TierValues {
        critical: 0,
        high: 10,
        medium: 5,
        low: 2,
    }
}

const fn default_send_intervals_ms() -> TierValues<u64> {
    TierValues {
        critical: 0,
        high: 100,
        medium: 250,
        low: 500,
    }
}

const fn default_testing_interval_ms() -> u64 {
    10
}

fn default_retry_delays_ms() -> Vec<u64> {
    vec![1_000, 5_000, 15_000]
}

const fn default_max_queue_size() -> usize {
    10_000
}

const fn default_batch_size() -> usize {
    10
}

const fn default_process_interval_ms() -> u64 {
    1_000
}

const fn default_cleanup_interval_secs() -> u64 {
    300
}

const fn default_persist_interval_secs() -> u64 {
    60
}

const fn default_max_age_secs() -> u64 {
    3_600
}

fn default_persistence_key() -> String {
    "missive:queue:snapshot".to_string()
}

const fn default_idempotency_prune_threshold() -> usize {
    1_000
}

/// Process-wide configuration for the delivery queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Upper bound on concurrently in-flight transmitter calls
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Per-tier sends per rolling one-second window (0 = unlimited)
    #[serde(default = "default_rate_limits")]
    pub rate_limits: TierValues<u32>,

    /// Per-tier minimum gap between consecutive sends, in milliseconds
    #[serde(default = "default_send_intervals_ms")]
    pub send_intervals_ms: TierValues<u64>,

    /// Interval applied to every tier while `testing_mode` is set
    #[serde(default = "default_testing_interval_ms")]
    pub testing_interval_ms: u64,

    /// Replace all tier intervals with `testing_interval_ms`
    #[serde(default)]
    pub testing_mode: bool,

    /// Ordered backoff table, in milliseconds; a failure on attempt k
    /// reschedules after `retry_delays_ms[min(k - 1, len - 1)]`
    #[serde(default = "default_retry_delays_ms")]
    pub retry_delays_ms: Vec<u64>,

    /// Active (pending + processing) items admitted before non-critical
    /// enqueues are rejected
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Most items dispatched by a single tick
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Dispatcher tick period, in milliseconds
    #[serde(default = "default_process_interval_ms")]
    pub process_interval_ms: u64,

    /// Cleanup pass period, in seconds
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Snapshot period, in seconds
    #[serde(default = "default_persist_interval_secs")]
    pub persist_interval_secs: u64,

    /// Terminal items older than this are reaped by cleanup, in seconds
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    /// Scheduler boost weights
    #[serde(default)]
    pub priority_boost: PriorityBoost,

    /// Key the snapshot record is stored under in the key-value collaborator
    #[serde(default = "default_persistence_key")]
    pub persistence_key: String,

    /// Per-recipient-domain token bucket limits (tokens per second);
    /// unlisted domains are unthrottled
    #[serde(default)]
    pub domain_limits: AHashMap<String, u32>,

    /// Idempotency keys retained before cleanup prunes unbound ones
    #[serde(default = "default_idempotency_prune_threshold")]
    pub idempotency_prune_threshold: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            rate_limits: default_rate_limits(),
            send_intervals_ms: default_send_intervals_ms(),
            testing_interval_ms: default_testing_interval_ms(),
            testing_mode: false,
            retry_delays_ms: default_retry_delays_ms(),
            max_queue_size: default_max_queue_size(),
            batch_size: default_batch_size(),
            process_interval_ms: default_process_interval_ms(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            persist_interval_secs: default_persist_interval_secs(),
            max_age_secs: default_max_age_secs(),
            priority_boost: PriorityBoost::default(),
            persistence_key: default_persistence_key(),
            domain_limits: AHashMap::new(),
            idempotency_prune_threshold: default_idempotency_prune_threshold(),
        }
    }
}

impl QueueConfig {
    /// The effective minimum inter-send interval for `tier`
    #[must_use]
    pub fn send_interval(&self, tier: Priority) -> Duration {
        let ms = if self.testing_mode {
            self.testing_interval_ms
        } else {
            self.send_intervals_ms.get(tier)
        };
        Duration::from_millis(ms)
    }

    /// Read configuration from a RON file.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Configuration`] when the file cannot be read
    /// or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, QueueError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            QueueError::Configuration(format!("Failed to read config from {}: {e}", path.display()))
        })?;
        ron::from_str(&content).map_err(|e| {
            QueueError::Configuration(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Find and load the configuration file using the following precedence:
    /// 1. `MISSIVE_CONFIG` environment variable
    /// 2. `./missive.config.ron` (current working directory)
    ///
    /// Falls back to defaults when neither exists.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Configuration`] when a discovered file cannot
    /// be read or parsed, or when `MISSIVE_CONFIG` points at a non-existent
    /// path.
    pub fn discover() -> Result<Self, QueueError> {
        if let Ok(env_path) = std::env::var("MISSIVE_CONFIG") {
            let path = std::path::PathBuf::from(env_path);
            if !path.exists() {
                return Err(QueueError::Configuration(format!(
                    "MISSIVE_CONFIG points to non-existent file: {}",
                    path.display()
                )));
            }
            return Self::from_path(path);
        }

        let default_path = std::path::Path::new("./missive.config.ron");
        if default_path.exists() {
            return Self::from_path(default_path);
        }

        Ok(Self::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.max_concurrent, 5);
        assert_eq!(config.rate_limits.get(Priority::Critical), 0);
        assert_eq!(config.rate_limits.get(Priority::Low), 2);
        assert_eq!(config.max_queue_size, 10_000);
        assert_eq!(config.retry_delays_ms, vec![1_000, 5_000, 15_000]);
        assert!(!config.testing_mode);
    }

    #[test]
    fn test_send_interval_testing_override() {
        let config = QueueConfig {
            testing_mode: true,
            testing_interval_ms: 7,
            ..Default::default()
        };
        for tier in Priority::ALL {
            assert_eq!(config.send_interval(tier), Duration::from_millis(7));
        }

        let config = QueueConfig::default();
        assert_eq!(
            config.send_interval(Priority::Low),
            Duration::from_millis(500)
        );
        assert_eq!(config.send_interval(Priority::Critical), Duration::ZERO);
    }

    #[test]
    fn test_ron_roundtrip() {
        let ron_config = r#"(
            max_concurrent: 3,
            rate_limits: (critical: 0, high: 1, medium: 1, low: 1),
            retry_delays_ms: [1000, 5000, 15000],
            testing_mode: true,
            domain_limits: {"example.com": 2},
        )"#;

        let config: QueueConfig = ron::from_str(ron_config).unwrap();
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.rate_limits.get(Priority::High), 1);
        assert_eq!(config.retry_delays_ms, vec![1000, 5000, 15000]);
        assert!(config.testing_mode);
        assert_eq!(config.domain_limits.get("example.com"), Some(&2));
        // Unspecified fields fall back to defaults
        assert_eq!(config.batch_size, 10);
    }
}
