//! The retrying gateway client
//!
//! Drives a single recipient send through rate limiting, timeouts, and
//! exponential backoff. One level up, the worker decides what to do with the
//! outcome; this module only answers "did this recipient's send succeed, get
//! rejected, or exhaust its retries".

use std::{sync::Arc, time::Duration};

use shortwire_common::outbound;

use crate::{
    error::{DispatchError, RejectionError, TransientError},
    gateway::{Gateway, GatewayError, GatewayResponse},
    rate_limiter::RateLimiter,
    retry::RetryPolicy,
};

/// Gateway client with per-attempt rate limiting and retry on transient
/// failures.
#[derive(Debug)]
pub struct RetryingClient {
    gateway: Arc<dyn Gateway>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    /// How long one attempt may wait for a rate token.
    acquire_timeout: Duration,
    /// How long one gateway call may take before it counts as timed out.
    request_timeout: Duration,
}

impl RetryingClient {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn Gateway>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
        acquire_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            limiter,
            policy,
            acquire_timeout,
            request_timeout,
        }
    }

    /// Send one piece of content to one recipient, retrying transient
    /// failures with exponential backoff.
    ///
    /// Every attempt consumes its own rate token; tokens are never held
    /// across the backoff sleep. Failing to obtain a token within the
    /// acquisition timeout counts as a transient attempt failure.
    ///
    /// # Errors
    /// [`DispatchError::Rejected`] as soon as the gateway definitively
    /// refuses; [`DispatchError::Transient`] with
    /// [`TransientError::RetriesExhausted`] once every attempt has failed
    /// transiently.
    pub async fn send_one(
        &self,
        phone: &str,
        content: &str,
    ) -> Result<GatewayResponse, DispatchError> {
        let mut last_error = String::new();

        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 {
                let delay = self.policy.backoff_delay(attempt - 1);
                tracing::debug!(
                    phone = %phone,
                    attempt,
                    delay_seconds = delay.as_secs_f64(),
                    "Backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }

            if !self.limiter.acquire(self.acquire_timeout).await {
                last_error =
                    TransientError::RateLimitTimeout(self.acquire_timeout).to_string();
                tracing::warn!(
                    phone = %phone,
                    attempt,
                    "No rate token within acquisition timeout"
                );
                continue;
            }

            match tokio::time::timeout(self.request_timeout, self.gateway.send(phone, content))
                .await
            {
                Ok(Ok(response)) => {
                    outbound!(
                        level = DEBUG,
                        "Gateway accepted message for {phone} on attempt {attempt} (status {})",
                        response.status_code
                    );
                    return Ok(response);
                }

                // A rejection is definitive; remaining attempts are moot
                Ok(Err(GatewayError::Rejected { reason })) => {
                    outbound!(
                        level = INFO,
                        "Gateway rejected message for {phone} on attempt {attempt}: {reason}"
                    );
                    return Err(DispatchError::Rejected(RejectionError::GatewayRejected(
                        reason,
                    )));
                }

                Ok(Err(error)) => {
                    last_error = error.to_string();
                    outbound!(
                        level = WARN,
                        "Transient gateway failure for {phone} on attempt {attempt}, {} remaining: {last_error}",
                        self.policy.remaining_attempts(attempt)
                    );
                }

                Err(_elapsed) => {
                    last_error = format!(
                        "no response within {}s",
                        self.request_timeout.as_secs_f64()
                    );
                    outbound!(
                        level = WARN,
                        "Gateway call for {phone} timed out on attempt {attempt}, {} remaining",
                        self.policy.remaining_attempts(attempt)
                    );
                }
            }
        }

        Err(DispatchError::Transient(TransientError::RetriesExhausted {
            attempts: self.policy.max_attempts,
            last_error,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::rate_limiter::RateLimitConfig;

    /// Fails transiently a fixed number of times, then succeeds.
    #[derive(Debug)]
    struct FlakyGateway {
        failures_before_success: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Gateway for FlakyGateway {
        async fn send(
            &self,
            _phone: &str,
            _content: &str,
        ) -> Result<GatewayResponse, GatewayError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(GatewayError::ConnectionFailed("refused".to_string()))
            } else {
                Ok(GatewayResponse {
                    status_code: 200,
                    body: "ok".to_string(),
                })
            }
        }
    }

    /// Rejects everything.
    #[derive(Debug)]
    struct RejectingGateway {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Gateway for RejectingGateway {
        async fn send(
            &self,
            _phone: &str,
            _content: &str,
        ) -> Result<GatewayResponse, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(GatewayError::Rejected {
                reason: "invalid destination".to_string(),
            })
        }
    }

    fn client(gateway: Arc<dyn Gateway>, policy: RetryPolicy) -> RetryingClient {
        let limiter = Arc::new(RateLimiter::new(&RateLimitConfig::default()));
        RetryingClient::new(
            gateway,
            limiter,
            policy,
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_backoff_secs: 0,
            max_backoff_secs: 0,
            jitter_factor: 0.0,
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let gateway = Arc::new(FlakyGateway {
            failures_before_success: 2,
            calls: AtomicUsize::new(0),
        });
        let client = client(gateway.clone(), fast_policy());

        let response = client.send_one("85251234567", "hello").await.unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_retries_on_persistent_transient_failure() {
        let gateway = Arc::new(FlakyGateway {
            failures_before_success: usize::MAX,
            calls: AtomicUsize::new(0),
        });
        let client = client(gateway.clone(), fast_policy());

        let error = client.send_one("85251234567", "hello").await.unwrap_err();
        assert!(matches!(
            error,
            DispatchError::Transient(TransientError::RetriesExhausted { attempts: 3, .. })
        ));
        assert!(error.to_string().contains("Connection failed"));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rejection_short_circuits_remaining_attempts() {
        let gateway = Arc::new(RejectingGateway {
            calls: AtomicUsize::new(0),
        });
        let client = client(gateway.clone(), fast_policy());

        let error = client.send_one("85251234567", "hello").await.unwrap_err();
        assert!(error.is_rejection());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn acquisition_timeout_is_a_transient_attempt_failure() {
        let gateway = Arc::new(FlakyGateway {
            failures_before_success: 0,
            calls: AtomicUsize::new(0),
        });

        // An empty, barely-refilling bucket: every acquisition times out
        let limiter = Arc::new(RateLimiter::new(&RateLimitConfig {
            messages_per_second: 0.001,
            burst_size: 1,
            acquire_poll_interval_ms: 5,
        }));
        assert!(limiter.try_acquire());

        let client = RetryingClient::new(
            gateway.clone(),
            limiter,
            fast_policy(),
            Duration::from_millis(20),
            Duration::from_secs(5),
        );

        let error = client.send_one("85251234567", "hello").await.unwrap_err();
        assert!(matches!(
            error,
            DispatchError::Transient(TransientError::RetriesExhausted { .. })
        ));
        assert!(error.to_string().contains("No rate token"));

        // The gateway was never reached
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }
}
