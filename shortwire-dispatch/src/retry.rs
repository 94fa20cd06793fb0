//! Retry policy for gateway send attempts.
//!
//! Encapsulates retry configuration and the backoff arithmetic so the
//! retrying client can be reasoned about and tested independently of the
//! gateway itself.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy for a single recipient send.
///
/// Only transient failures consume attempts; a rejection ends the send
/// immediately regardless of how many attempts remain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of send attempts before giving up.
    ///
    /// Default: 3 attempts
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff (in seconds).
    ///
    /// The delay after the k-th transient failure is `base * 2^(k - 1)`.
    ///
    /// Default: 2 seconds
    #[serde(default = "defaults::base_backoff_secs")]
    pub base_backoff_secs: u64,

    /// Maximum backoff delay (in seconds).
    ///
    /// Caps the exponential growth.
    ///
    /// Default: 10 seconds
    #[serde(default = "defaults::max_backoff_secs")]
    pub max_backoff_secs: u64,

    /// Jitter factor for randomizing backoff delays.
    ///
    /// The delay is randomized within ±`jitter_factor`. Defaults to 0 so
    /// backoff timing is deterministic unless a deployment opts in.
    #[serde(default = "defaults::jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_backoff_secs: defaults::base_backoff_secs(),
            max_backoff_secs: defaults::max_backoff_secs(),
            jitter_factor: defaults::jitter_factor(),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if another attempt should be made after `attempt_count`
    /// transient failures.
    #[must_use]
    pub const fn should_retry(&self, attempt_count: u32) -> bool {
        attempt_count < self.max_attempts
    }

    /// Get the number of remaining attempts.
    #[must_use]
    pub const fn remaining_attempts(&self, attempt_count: u32) -> u32 {
        self.max_attempts.saturating_sub(attempt_count)
    }

    /// Calculate the backoff delay after the `failures`-th transient
    /// failure (1-indexed).
    ///
    /// # Formula
    /// `delay = min(base * 2^(failures - 1), max_backoff) * (1 ± jitter)`
    #[must_use]
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1);
        let delay_secs = if exponent >= 63 {
            // 2^63 would overflow
            self.max_backoff_secs
        } else {
            let multiplier = 1u64 << exponent;
            self.base_backoff_secs
                .saturating_mul(multiplier)
                .min(self.max_backoff_secs)
        };

        if self.jitter_factor <= 0.0 {
            return Duration::from_secs(delay_secs);
        }

        // Intentional precision loss for randomization
        #[allow(clippy::cast_precision_loss)]
        let jittered = {
            use rand::Rng;

            let jitter_range = (delay_secs as f64) * self.jitter_factor;
            let mut rng = rand::rng();
            let jitter: f64 = rng.random_range(-jitter_range..=jitter_range);
            ((delay_secs as f64) + jitter).max(0.0)
        };

        Duration::from_secs_f64(jittered)
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        3
    }

    pub const fn base_backoff_secs() -> u64 {
        2
    }

    pub const fn max_backoff_secs() -> u64 {
        10
    }

    pub const fn jitter_factor() -> f64 {
        0.0
    }
}
