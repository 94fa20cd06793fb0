//! The gateway seam.
//!
//! The dispatch core never speaks the gateway's wire format. It consumes a
//! single-call abstraction: send this content to this phone number, tell me
//! whether it was accepted. HTTP clients, provider SDKs, and test doubles
//! all live behind this trait.

use async_trait::async_trait;
use thiserror::Error;

/// A successful acceptance from the external SMS gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    /// Status code reported by the gateway.
    pub status_code: u16,
    /// Raw response body, kept for logging and diagnosis.
    pub body: String,
}

/// Failure modes of a single gateway call.
///
/// The split matters downstream: connection failures and timeouts are worth
/// retrying, a rejection is the gateway's definitive answer.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Could not reach the gateway at all.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The gateway did not answer in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The gateway answered and said no.
    #[error("Rejected by gateway: {reason}")]
    Rejected { reason: String },
}

/// An external SMS gateway.
///
/// Implementations must be safe to call concurrently from every worker.
/// One call sends one piece of content to one recipient.
#[async_trait]
pub trait Gateway: Send + Sync + std::fmt::Debug {
    async fn send(&self, phone: &str, content: &str) -> Result<GatewayResponse, GatewayError>;
}
