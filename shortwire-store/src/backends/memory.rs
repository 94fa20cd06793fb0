use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::SystemTime,
};

use async_trait::async_trait;
use shortwire_common::{
    model::{Message, MessageId},
    status::{DeadLetterStatus, ErrorKind, JobStatus, RecipientStatus},
};

use crate::{
    StoreError,
    dead_letter::{DeadLetterId, DeadLetterRecord, DeadLetterStats, DeadLetterStore},
    message_store::MessageStore,
};

/// In-memory message store.
///
/// Messages live in a `HashMap` protected by an `RwLock`. Primarily intended
/// for testing and single-process deployments; every mutation happens under
/// one write-lock acquisition, which stands in for a backend transaction.
///
/// # Performance
/// - Insert/read/update: O(1) `HashMap` access plus a clone
/// - Pending listing: O(n log n), clones and sorts by ULID
#[derive(Debug, Clone, Default)]
pub struct MemoryMessageStore {
    messages: Arc<RwLock<HashMap<MessageId, Message>>>,
}

impl MemoryMessageStore {
    /// Create a new empty message store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored messages
    ///
    /// Recovers gracefully if the lock is poisoned by accessing the
    /// underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn insert(&self, message: &Message) -> crate::Result<()> {
        self.messages
            .write()?
            .insert(message.id.clone(), message.clone());
        Ok(())
    }

    async fn get(&self, id: &MessageId) -> crate::Result<Message> {
        self.messages
            .read()?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::MessageNotFound(id.clone()))
    }

    async fn pending(&self) -> crate::Result<Vec<Message>> {
        let mut pending: Vec<_> = self
            .messages
            .read()?
            .values()
            .filter(|message| message.job_status == JobStatus::Pending)
            .cloned()
            .collect();

        // ULIDs are lexicographically sortable by creation time
        pending.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(pending)
    }

    async fn mark_sending(&self, id: &MessageId) -> crate::Result<()> {
        let mut messages = self.messages.write()?;
        let message = messages
            .get_mut(id)
            .ok_or_else(|| StoreError::MessageNotFound(id.clone()))?;

        // Job status never moves backwards
        if message.job_status == JobStatus::Pending {
            message.job_status = JobStatus::Sending;
        }

        Ok(())
    }

    async fn set_recipient_status(
        &self,
        id: &MessageId,
        phone: &str,
        status: RecipientStatus,
        error_message: Option<String>,
    ) -> crate::Result<()> {
        let mut messages = self.messages.write()?;
        let message = messages
            .get_mut(id)
            .ok_or_else(|| StoreError::MessageNotFound(id.clone()))?;

        let recipient = message
            .recipients
            .iter_mut()
            .find(|r| r.phone == phone)
            .ok_or_else(|| StoreError::RecipientNotFound {
                message_id: id.clone(),
                phone: phone.to_string(),
            })?;

        // Terminal recipient statuses are immutable
        if recipient.status.is_terminal() {
            return Ok(());
        }

        recipient.status = status;
        recipient.error_message = error_message;

        Ok(())
    }

    async fn finalise(&self, id: &MessageId) -> crate::Result<JobStatus> {
        let mut messages = self.messages.write()?;
        let message = messages
            .get_mut(id)
            .ok_or_else(|| StoreError::MessageNotFound(id.clone()))?;

        let status = message.derive_status();
        message.job_status = status;

        if status.is_terminal() && message.sent_at.is_none() {
            message.sent_at = Some(SystemTime::now());
        }

        Ok(status)
    }
}

/// In-memory dead-letter store.
///
/// Append-only: records are inserted once and only ever transitioned through
/// the lifecycle methods, mirroring what a database-backed store would do
/// with status-update statements.
#[derive(Debug, Clone, Default)]
pub struct MemoryDeadLetterStore {
    records: Arc<RwLock<HashMap<DeadLetterId, DeadLetterRecord>>>,
}

impl MemoryDeadLetterStore {
    /// Create a new empty dead-letter store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(records: Vec<DeadLetterRecord>) -> Vec<DeadLetterRecord> {
        let mut records = records;
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }
}

#[async_trait]
impl DeadLetterStore for MemoryDeadLetterStore {
    async fn add(
        &self,
        message_id: Option<MessageId>,
        phone: &str,
        content: &str,
        error_message: &str,
        error_kind: ErrorKind,
    ) -> crate::Result<DeadLetterRecord> {
        let record = DeadLetterRecord::new(message_id, phone, content, error_message, error_kind);

        self.records
            .write()?
            .insert(record.id.clone(), record.clone());

        Ok(record)
    }

    async fn get(&self, id: &DeadLetterId) -> crate::Result<DeadLetterRecord> {
        self.records
            .read()?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::DeadLetterNotFound(id.clone()))
    }

    async fn pending(&self, limit: usize) -> crate::Result<Vec<DeadLetterRecord>> {
        let pending: Vec<_> = self
            .records
            .read()?
            .values()
            .filter(|record| record.status == DeadLetterStatus::Pending)
            .cloned()
            .collect();

        let mut pending = Self::sorted(pending);
        pending.truncate(limit);

        Ok(pending)
    }

    async fn list(&self, status: Option<DeadLetterStatus>) -> crate::Result<Vec<DeadLetterRecord>> {
        let records: Vec<_> = self
            .records
            .read()?
            .values()
            .filter(|record| status.is_none_or(|wanted| record.status == wanted))
            .cloned()
            .collect();

        Ok(Self::sorted(records))
    }

    async fn retry(&self, id: &DeadLetterId) -> crate::Result<bool> {
        let mut records = self.records.write()?;

        let Some(record) = records.get_mut(id) else {
            return Ok(false);
        };

        if !record.can_retry() {
            return Ok(false);
        }

        record.retry_count += 1;
        record.last_attempt_at = SystemTime::now();

        Ok(true)
    }

    async fn mark_retried(&self, id: &DeadLetterId) -> crate::Result<bool> {
        let mut records = self.records.write()?;

        let Some(record) = records.get_mut(id) else {
            return Ok(false);
        };

        if record.status != DeadLetterStatus::Pending {
            return Ok(false);
        }

        record.status = DeadLetterStatus::Retried;

        Ok(true)
    }

    async fn mark_abandoned(&self, id: &DeadLetterId) -> crate::Result<bool> {
        let mut records = self.records.write()?;

        let Some(record) = records.get_mut(id) else {
            return Ok(false);
        };

        if record.status == DeadLetterStatus::Abandoned {
            return Ok(false);
        }

        record.status = DeadLetterStatus::Abandoned;

        Ok(true)
    }

    async fn stats(&self) -> crate::Result<DeadLetterStats> {
        let records = self.records.read()?;
        let mut stats = DeadLetterStats::default();

        for record in records.values() {
            match record.status {
                DeadLetterStatus::Pending => stats.pending += 1,
                DeadLetterStatus::Retried => stats.retried += 1,
                DeadLetterStatus::Abandoned => stats.abandoned += 1,
            }
        }

        Ok(stats)
    }
}
