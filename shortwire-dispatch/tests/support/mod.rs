//! Test support: a scriptable in-process gateway.

use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use shortwire_dispatch::{Gateway, GatewayError, GatewayResponse};

/// What the gateway should do for one call.
#[derive(Debug, Clone)]
pub enum Outcome {
    Accept,
    ConnectionFailed,
    Timeout,
    Reject(String),
    Panic,
}

/// In-process gateway driven by per-phone scripts.
///
/// Each call to a phone pops the next scripted outcome; once a script is
/// drained (or for unscripted phones) every call is accepted. All calls are
/// recorded in order for assertions on throughput and FIFO behaviour.
#[derive(Debug, Default)]
pub struct MockGateway {
    scripts: Mutex<HashMap<String, VecDeque<Outcome>>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

#[allow(dead_code)] // Not every test binary uses every helper
impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway whose every call takes `delay` to resolve.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Queue outcomes for calls to `phone`, consumed in order.
    pub fn script<I>(&self, phone: &str, outcomes: I)
    where
        I: IntoIterator<Item = Outcome>,
    {
        self.scripts
            .lock()
            .entry(phone.to_string())
            .or_default()
            .extend(outcomes);
    }

    /// Every phone called so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn send(&self, phone: &str, _content: &str) -> Result<GatewayResponse, GatewayError> {
        self.calls.lock().push(phone.to_string());

        let outcome = self
            .scripts
            .lock()
            .get_mut(phone)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Outcome::Accept);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match outcome {
            Outcome::Accept => Ok(GatewayResponse {
                status_code: 200,
                body: "accepted".to_string(),
            }),
            Outcome::ConnectionFailed => {
                Err(GatewayError::ConnectionFailed("connection refused".to_string()))
            }
            Outcome::Timeout => Err(GatewayError::Timeout("no response".to_string())),
            Outcome::Reject(reason) => Err(GatewayError::Rejected { reason }),
            Outcome::Panic => panic!("scripted gateway panic"),
        }
    }
}
