//! Typed error handling for dispatch operations.
//!
//! This module provides structured error types that distinguish between:
//! - Transient failures (connection trouble, timeouts) - retry with backoff
//! - Rejections (the gateway's definitive no) - don't retry
//! - Defects (panics in task bodies) - never retry, always dead-letter

use std::time::Duration;

use shortwire_common::status::ErrorKind;
use shortwire_store::StoreError;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Top-level dispatch error type.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Transient failure; retrying was (or would be) worthwhile.
    #[error("Transient failure: {0}")]
    Transient(#[from] TransientError),

    /// Definitive rejection that must not be retried.
    #[error("Rejected: {0}")]
    Rejected(#[from] RejectionError),

    /// The task queue is at capacity; the producer must back off.
    #[error("Task queue is full")]
    QueueFull,

    /// The dispatcher has been stopped and accepts no more work.
    #[error("Dispatcher is stopped")]
    Stopped,

    /// A task body panicked; the payload is preserved for diagnosis.
    #[error("Task defect: {0}")]
    Defect(String),

    /// The persistence layer failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures where a later attempt could plausibly succeed.
#[derive(Debug, Error)]
pub enum TransientError {
    /// Could not reach the gateway.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The gateway did not answer within the request timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// No rate token became available within the acquisition timeout.
    #[error("No rate token available within {0:?}")]
    RateLimitTimeout(Duration),

    /// Every attempt failed transiently; the last failure is preserved.
    #[error("Retries exhausted after {attempts} attempts, last error: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Definitive answers that retrying cannot change.
#[derive(Debug, Error)]
pub enum RejectionError {
    /// The gateway accepted the request and refused the message.
    #[error("Gateway rejected message: {0}")]
    GatewayRejected(String),

    /// A message must have at least one recipient.
    #[error("Message has no recipients")]
    EmptyRecipients,
}

impl DispatchError {
    /// Returns `true` if this failure is worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns `true` if this is a definitive rejection.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Classify this error for dead-letter recording.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transient(_) => ErrorKind::Transient,
            Self::Rejected(_) => ErrorKind::Application,
            Self::QueueFull | Self::Stopped | Self::Defect(_) | Self::Store(_) => {
                ErrorKind::Defect
            }
        }
    }
}

/// Convert a single gateway call failure into a dispatch error.
///
/// Connection failures and timeouts are transient; a rejection is the
/// gateway's definitive answer and is surfaced as such.
impl From<GatewayError> for DispatchError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::ConnectionFailed(msg) => {
                Self::Transient(TransientError::ConnectionFailed(msg))
            }
            GatewayError::Timeout(msg) => Self::Transient(TransientError::Timeout(msg)),
            GatewayError::Rejected { reason } => {
                Self::Rejected(RejectionError::GatewayRejected(reason))
            }
        }
    }
}
