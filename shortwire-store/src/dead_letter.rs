//! The dead-letter persistence collaborator.
//!
//! A dead letter is one permanently-failed send: the retrying client gave up
//! on it (or the gateway rejected it outright), and it now awaits operator
//! action. Records are an append-only audit trail; they are never deleted,
//! only transitioned between `Pending`, `Retried`, and `Abandoned`.

use std::time::SystemTime;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shortwire_common::{
    model::MessageId,
    status::{DeadLetterStatus, ErrorKind},
};

use crate::Result;

/// How many times an operator may re-drive a record before it can only be
/// abandoned.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Identifier for a dead-letter record (a ULID, sortable by creation time).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeadLetterId {
    id: ulid::Ulid,
}

impl DeadLetterId {
    /// Generate a new unique record ID
    #[must_use]
    pub fn generate() -> Self {
        Self {
            id: ulid::Ulid::new(),
        }
    }

    /// Get the underlying ULID
    #[must_use]
    pub const fn ulid(&self) -> ulid::Ulid {
        self.id
    }
}

impl std::fmt::Display for DeadLetterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl serde::Serialize for DeadLetterId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.id.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for DeadLetterId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let id = ulid::Ulid::from_string(&s).map_err(serde::de::Error::custom)?;
        Ok(Self { id })
    }
}

/// One permanently-failed send awaiting operator action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub id: DeadLetterId,
    /// The message this send belonged to, when known.
    pub message_id: Option<MessageId>,
    /// Destination phone number of the failed send.
    pub phone: String,
    /// The content that failed to send, preserved for re-drive.
    pub content: String,
    /// The original error, preserved for operator diagnosis.
    pub error_message: String,
    pub error_kind: ErrorKind,
    /// How many times an operator has re-driven this record.
    pub retry_count: u32,
    pub max_retries: u32,
    pub status: DeadLetterStatus,
    pub created_at: SystemTime,
    pub last_attempt_at: SystemTime,
}

impl DeadLetterRecord {
    /// Create a new pending record with no retries consumed.
    #[must_use]
    pub fn new(
        message_id: Option<MessageId>,
        phone: impl Into<String>,
        content: impl Into<String>,
        error_message: impl Into<String>,
        error_kind: ErrorKind,
    ) -> Self {
        let now = SystemTime::now();

        Self {
            id: DeadLetterId::generate(),
            message_id,
            phone: phone.into(),
            content: content.into(),
            error_message: error_message.into(),
            error_kind,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            status: DeadLetterStatus::Pending,
            created_at: now,
            last_attempt_at: now,
        }
    }

    /// Whether this record is still eligible for an operator retry.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.status == DeadLetterStatus::Pending && self.retry_count < self.max_retries
    }
}

/// Counts of dead-letter records by lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterStats {
    pub pending: usize,
    pub retried: usize,
    pub abandoned: usize,
}

impl DeadLetterStats {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.pending + self.retried + self.abandoned
    }
}

/// Durable storage for dead-letter records.
///
/// `retry` only flags eligibility and bumps the counter; actually
/// re-submitting the content to the task queue is the caller's
/// responsibility. A record that has consumed its retries can only be
/// abandoned, and only by an explicit operator action.
#[async_trait]
pub trait DeadLetterStore: Send + Sync + std::fmt::Debug {
    /// Record a permanently-failed send. Always succeeds, creating a
    /// `Pending` record with `retry_count` 0.
    async fn add(
        &self,
        message_id: Option<MessageId>,
        phone: &str,
        content: &str,
        error_message: &str,
        error_kind: ErrorKind,
    ) -> Result<DeadLetterRecord>;

    /// Fetch a record by id.
    ///
    /// # Errors
    /// Returns [`StoreError::DeadLetterNotFound`](crate::StoreError::DeadLetterNotFound)
    /// if no such record exists.
    async fn get(&self, id: &DeadLetterId) -> Result<DeadLetterRecord>;

    /// Up to `limit` records still `Pending`, oldest first.
    async fn pending(&self, limit: usize) -> Result<Vec<DeadLetterRecord>>;

    /// All records, oldest first, optionally filtered by status.
    async fn list(&self, status: Option<DeadLetterStatus>) -> Result<Vec<DeadLetterRecord>>;

    /// Flag a record as eligible for re-drive, bumping its retry counter
    /// and `last_attempt_at`.
    ///
    /// Returns `true` iff the record exists, is `Pending`, and has retries
    /// remaining. Returns `false` with no mutation otherwise; repeated
    /// ineligible calls are idempotent.
    async fn retry(&self, id: &DeadLetterId) -> Result<bool>;

    /// Transition a `Pending` record to `Retried` once the caller has
    /// re-submitted it. Returns `false` if the record is missing or not
    /// `Pending`.
    async fn mark_retried(&self, id: &DeadLetterId) -> Result<bool>;

    /// Transition a record to `Abandoned`. Returns `false` if the record is
    /// missing or already abandoned.
    async fn mark_abandoned(&self, id: &DeadLetterId) -> Result<bool>;

    /// Counts of records by status.
    async fn stats(&self) -> Result<DeadLetterStats>;
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn new_record_defaults() {
        let record = DeadLetterRecord::new(
            None,
            "85251234567",
            "hello",
            "Connection failed: refused",
            ErrorKind::Transient,
        );

        assert_eq!(record.retry_count, 0);
        assert_eq!(record.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(record.status, DeadLetterStatus::Pending);
        assert!(record.can_retry());
    }

    #[test]
    fn retries_exhaust_eligibility() {
        let mut record =
            DeadLetterRecord::new(None, "85251234567", "hello", "timeout", ErrorKind::Transient);

        record.retry_count = record.max_retries;
        assert!(!record.can_retry());

        record.retry_count = 0;
        record.status = DeadLetterStatus::Abandoned;
        assert!(!record.can_retry());
    }

    #[test]
    fn stats_total() {
        let stats = DeadLetterStats {
            pending: 2,
            retried: 1,
            abandoned: 3,
        };
        assert_eq!(stats.total(), 6);
    }
}
