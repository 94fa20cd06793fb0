//! Dispatcher configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{rate_limiter::RateLimitConfig, retry::RetryPolicy};

/// Configuration for the dispatch pipeline.
///
/// Every field has a default, so `DispatchConfig::default()` yields a
/// working setup and deployments only override what they care about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Number of worker tasks claiming from the queue.
    ///
    /// Default: number of CPUs
    #[serde(default = "defaults::workers")]
    pub workers: usize,

    /// Maximum number of queued tasks before producers are rejected.
    ///
    /// Default: 100
    #[serde(default = "defaults::queue_capacity")]
    pub queue_capacity: usize,

    /// Shared token-bucket rate limit towards the gateway.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Retry policy for individual recipient sends.
    #[serde(default)]
    pub retry: RetryPolicy,

    /// How long one send attempt may wait for a rate token (in seconds).
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// How long one gateway call may take (in seconds).
    ///
    /// Default: 10 seconds
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long an idle worker waits on the queue before re-checking its
    /// shutdown signal (in milliseconds).
    ///
    /// Default: 500 milliseconds
    #[serde(default = "defaults::dequeue_timeout_ms")]
    pub dequeue_timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: defaults::workers(),
            queue_capacity: defaults::queue_capacity(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryPolicy::default(),
            acquire_timeout_secs: defaults::acquire_timeout_secs(),
            request_timeout_secs: defaults::request_timeout_secs(),
            dequeue_timeout_ms: defaults::dequeue_timeout_ms(),
        }
    }
}

impl DispatchConfig {
    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub const fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }
}

mod defaults {
    pub fn workers() -> usize {
        num_cpus::get()
    }

    pub const fn queue_capacity() -> usize {
        100
    }

    pub const fn acquire_timeout_secs() -> u64 {
        30
    }

    pub const fn request_timeout_secs() -> u64 {
        10
    }

    pub const fn dequeue_timeout_ms() -> u64 {
        500
    }
}
