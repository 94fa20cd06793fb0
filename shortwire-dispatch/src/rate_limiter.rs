//! Shared rate limiting using the token bucket algorithm
//!
//! All workers draw from one bucket, so the aggregate send rate towards the
//! gateway is bounded no matter how many workers are running.
//!
//! # Token Bucket Algorithm
//!
//! - Tokens are added to the bucket at a constant rate (`messages_per_second`)
//! - Each send attempt consumes one token
//! - If no tokens are available, the attempt waits
//! - Bucket has maximum capacity (allows bursts)
//!
//! # Example
//!
//! ```text
//! Rate limit: 10 msg/sec, burst: 20
//! - Bucket starts with 20 tokens
//! - Tokens refill at 10/sec
//! - Can send 20 messages immediately (burst)
//! - Then limited to 10/sec sustained rate
//! ```

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Configuration for rate limiting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained messages per second towards the gateway
    #[serde(default = "default_messages_per_second")]
    pub messages_per_second: f64,

    /// Burst size (max tokens in bucket)
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,

    /// How often a blocked acquisition re-checks the bucket, in milliseconds
    #[serde(default = "default_acquire_poll_interval_ms")]
    pub acquire_poll_interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            messages_per_second: default_messages_per_second(),
            burst_size: default_burst_size(),
            acquire_poll_interval_ms: default_acquire_poll_interval_ms(),
        }
    }
}

const fn default_messages_per_second() -> f64 {
    10.0 // 10 messages per second default
}

const fn default_burst_size() -> u32 {
    20 // Allow bursts of 20 messages
}

const fn default_acquire_poll_interval_ms() -> u64 {
    25
}

/// The token bucket state, always accessed under the limiter's mutex
#[derive(Debug)]
struct TokenBucket {
    /// Current number of tokens (fractional)
    tokens: f64,
    /// Maximum tokens (burst size)
    capacity: f64,
    /// Tokens added per second
    refill_rate: f64,
    /// Last time tokens were added
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a new token bucket
    fn new(messages_per_second: f64, burst_size: u32) -> Self {
        let capacity = f64::from(burst_size);
        Self {
            tokens: capacity, // Start with full bucket
            capacity,
            refill_rate: messages_per_second,
            last_refill: Instant::now(),
        }
    }

    /// Refill tokens based on elapsed time
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        let tokens_to_add = elapsed * self.refill_rate;
        self.tokens = (self.tokens + tokens_to_add).min(self.capacity);
        self.last_refill = now;
    }

    /// Try to consume one token, returns true if successful
    fn try_consume(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Calculate wait time until a token becomes available
    fn time_until_available(&mut self) -> Duration {
        self.refill();

        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }

        // A non-positive rate never refills; an infinite wait keeps the
        // division below finite
        if self.refill_rate <= 0.0 {
            return Duration::MAX;
        }

        let tokens_needed = 1.0 - self.tokens;
        let seconds = tokens_needed / self.refill_rate;
        Duration::from_secs_f64(seconds)
    }
}

/// Shared rate limiter drawn on by every worker.
///
/// The mutex is held only for the refill-and-consume arithmetic; waiting for
/// a token happens outside the lock, so a blocked acquisition never stalls
/// other workers.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: parking_lot::Mutex<TokenBucket>,
    /// Sustained rate, kept outside the bucket for lock-free reads
    rate_per_second: f64,
    poll_interval: Duration,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            bucket: parking_lot::Mutex::new(TokenBucket::new(
                config.messages_per_second,
                config.burst_size,
            )),
            rate_per_second: config.messages_per_second,
            poll_interval: Duration::from_millis(config.acquire_poll_interval_ms),
        }
    }

    /// Try to consume one token without waiting
    ///
    /// Returns `true` if a token was consumed.
    pub fn try_acquire(&self) -> bool {
        self.bucket.lock().try_consume()
    }

    /// Consume one token, waiting up to `timeout` for one to become
    /// available
    ///
    /// Returns `false` on deadline without consuming anything. The bucket
    /// lock is released while waiting.
    pub async fn acquire(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                if bucket.try_consume() {
                    return true;
                }
                bucket.time_until_available()
            };

            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(
                    timeout_seconds = timeout.as_secs_f64(),
                    "Rate token acquisition timed out"
                );
                return false;
            }

            let sleep = wait.min(self.poll_interval).min(deadline - now);
            tokio::time::sleep(sleep).await;
        }
    }

    /// Time until the next token becomes available
    pub fn time_until_available(&self) -> Duration {
        self.bucket.lock().time_until_available()
    }

    /// The configured sustained rate, used for ETA estimation
    #[must_use]
    pub const fn rate_per_second(&self) -> f64 {
        self.rate_per_second
    }

    /// Get current bucket stats (for monitoring/debugging)
    pub fn stats(&self) -> RateLimitStats {
        let mut bucket = self.bucket.lock();
        bucket.refill(); // Update tokens before reading

        RateLimitStats {
            available_tokens: bucket.tokens,
            capacity: bucket.capacity,
            refill_rate: bucket.refill_rate,
        }
    }
}

/// Statistics for the shared rate limiter
#[derive(Debug, Clone)]
pub struct RateLimitStats {
    /// Currently available tokens
    pub available_tokens: f64,
    /// Maximum capacity (burst size)
    pub capacity: f64,
    /// Refill rate (tokens per second)
    pub refill_rate: f64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn token_bucket_consume() {
        let mut bucket = TokenBucket::new(10.0, 20);

        // Should start with full capacity
        assert!(bucket.tokens >= 19.9);

        assert!(bucket.try_consume());
        assert!(bucket.tokens >= 18.9);

        // Consume all tokens
        for _ in 0..19 {
            assert!(bucket.try_consume());
        }

        // Should fail when empty
        assert!(!bucket.try_consume());
    }

    #[test]
    fn token_bucket_refill() {
        let mut bucket = TokenBucket::new(10.0, 20);

        for _ in 0..20 {
            bucket.try_consume();
        }
        assert!(!bucket.try_consume());

        // Simulate one second passing
        bucket.last_refill = Instant::now().checked_sub(Duration::from_secs(1)).unwrap();
        bucket.refill();

        // Should have ~10 tokens after 1 second at 10/sec rate
        assert!(bucket.tokens >= 9.9 && bucket.tokens <= 10.1);
        assert!(bucket.try_consume());
    }

    #[test]
    fn token_bucket_never_exceeds_capacity() {
        let mut bucket = TokenBucket::new(10.0, 20);

        // A long idle period must not accumulate more than the burst size
        bucket.last_refill = Instant::now()
            .checked_sub(Duration::from_secs(3600))
            .unwrap();
        bucket.refill();

        assert!(bucket.tokens <= 20.0);
    }

    #[test]
    fn limiter_allows_burst_then_blocks() {
        let limiter = RateLimiter::new(&RateLimitConfig::default());

        for _ in 0..20 {
            assert!(limiter.try_acquire());
        }

        assert!(!limiter.try_acquire());
        assert!(limiter.time_until_available() > Duration::ZERO);
    }

    #[test]
    fn limiter_stats() {
        let limiter = RateLimiter::new(&RateLimitConfig::default());

        assert!(limiter.try_acquire());

        let stats = limiter.stats();
        assert!((stats.available_tokens - 19.0).abs() < 0.1);
        assert!((stats.capacity - 20.0_f64).abs() < f64::MIN_POSITIVE);
        assert!((stats.refill_rate - 10.0_f64).abs() < f64::MIN_POSITIVE);
    }

    #[test]
    fn token_bucket_zero_rate_never_refills() {
        let mut bucket = TokenBucket::new(0.0, 1);

        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
        assert_eq!(bucket.time_until_available(), Duration::MAX);
    }

    #[tokio::test]
    async fn zero_rate_acquire_times_out_instead_of_panicking() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            messages_per_second: 0.0,
            burst_size: 1,
            acquire_poll_interval_ms: 5,
        });

        // The burst is still spendable
        assert!(limiter.acquire(Duration::from_millis(50)).await);

        // Once drained, nothing ever refills: acquisition must report an
        // infinite wait and time out cleanly
        assert_eq!(limiter.time_until_available(), Duration::MAX);
        assert!(!limiter.acquire(Duration::from_millis(30)).await);
    }

    #[tokio::test]
    async fn acquire_times_out_without_consuming() {
        let config = RateLimitConfig {
            messages_per_second: 0.1, // one token every 10 seconds
            burst_size: 1,
            acquire_poll_interval_ms: 5,
        };
        let limiter = RateLimiter::new(&config);

        assert!(limiter.acquire(Duration::from_millis(50)).await);

        // Bucket is empty and refills far too slowly for this deadline
        let start = Instant::now();
        assert!(!limiter.acquire(Duration::from_millis(50)).await);
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn acquire_waits_for_refill() {
        let config = RateLimitConfig {
            messages_per_second: 20.0, // one token every 50ms
            burst_size: 1,
            acquire_poll_interval_ms: 5,
        };
        let limiter = RateLimiter::new(&config);

        assert!(limiter.acquire(Duration::from_secs(1)).await);

        // Second acquisition must wait for the refill but succeed well
        // within the deadline
        let start = Instant::now();
        assert!(limiter.acquire(Duration::from_secs(1)).await);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
