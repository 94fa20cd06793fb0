//! Message and recipient models shared by the store and the dispatch core.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::status::{JobStatus, RecipientStatus};

/// Identifier for a submitted message.
///
/// This is a ULID: globally unique and lexicographically sortable by
/// creation time, so the store's ordering of message identifiers is also
/// the FIFO submission order used for queue-position estimates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId {
    id: ulid::Ulid,
}

impl MessageId {
    /// Create a message ID from an existing ULID
    #[must_use]
    pub const fn new(id: ulid::Ulid) -> Self {
        Self { id }
    }

    /// Generate a new unique message ID
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

    /// Get the timestamp (milliseconds since Unix epoch) encoded in this ID
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.id.timestamp_ms()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl serde::Serialize for MessageId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.id.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let id = ulid::Ulid::from_string(&s).map_err(serde::de::Error::custom)?;
        Ok(Self { id })
    }
}

/// One delivery target within a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    /// Destination phone number.
    pub phone: String,
    /// Current delivery status.
    pub status: RecipientStatus,
    /// Error detail, populated only when the status is `Failed`.
    pub error_message: Option<String>,
}

impl Recipient {
    /// Create a new pending recipient.
    #[must_use]
    pub fn new(phone: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            status: RecipientStatus::Pending,
            error_message: None,
        }
    }
}

/// One logical send request, possibly multi-recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// Message body sent to every recipient.
    pub content: String,
    pub recipients: Vec<Recipient>,
    /// Aggregate status, derived from the recipients (see
    /// [`JobStatus::derive`]).
    pub job_status: JobStatus,
    pub created_at: SystemTime,
    /// Set once the message reaches a terminal status.
    pub sent_at: Option<SystemTime>,
}

impl Message {
    /// Create a new pending message for the given recipients.
    #[must_use]
    pub fn new<I, S>(recipients: I, content: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: MessageId::generate(),
            content: content.into(),
            recipients: recipients.into_iter().map(Recipient::new).collect(),
            job_status: JobStatus::Pending,
            created_at: SystemTime::now(),
            sent_at: None,
        }
    }

    #[must_use]
    pub fn recipient_count(&self) -> usize {
        self.recipients.len()
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.recipients
            .iter()
            .filter(|r| r.status == RecipientStatus::Sent)
            .count()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.recipients
            .iter()
            .filter(|r| r.status == RecipientStatus::Failed)
            .count()
    }

    /// Recompute the aggregate status from the current recipient statuses.
    #[must_use]
    pub fn derive_status(&self) -> JobStatus {
        JobStatus::derive(self.recipients.iter().map(|r| r.status))
    }
}
