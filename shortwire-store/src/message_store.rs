//! The message persistence collaborator.

use async_trait::async_trait;
use shortwire_common::{
    model::{Message, MessageId},
    status::{JobStatus, RecipientStatus},
};

use crate::Result;

/// Durable storage for messages and their per-recipient statuses.
///
/// Implementations must treat every method as one atomic mutation: a write
/// either fully commits or returns an error, in which case the caller
/// re-derives state on its next observation.
#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug {
    /// Persist a newly submitted message with all recipients pending.
    async fn insert(&self, message: &Message) -> Result<()>;

    /// Fetch a message by id.
    ///
    /// # Errors
    /// Returns [`StoreError::MessageNotFound`](crate::StoreError::MessageNotFound)
    /// if no such message exists.
    async fn get(&self, id: &MessageId) -> Result<Message>;

    /// All messages still in the `Pending` job status, oldest first.
    ///
    /// Message IDs are ULIDs, so oldest-first is ascending ID order. This
    /// feeds queue-position and ETA estimates.
    async fn pending(&self) -> Result<Vec<Message>>;

    /// Mark a message as actively being sent.
    ///
    /// A no-op when the message has already progressed past `Pending`;
    /// job status never moves backwards.
    async fn mark_sending(&self, id: &MessageId) -> Result<()>;

    /// Record the outcome of one recipient's delivery.
    ///
    /// A terminal recipient status is never overwritten: setting a status on
    /// an already-resolved recipient is a no-op, which keeps a re-driven or
    /// defective task from clobbering earlier outcomes.
    async fn set_recipient_status(
        &self,
        id: &MessageId,
        phone: &str,
        status: RecipientStatus,
        error_message: Option<String>,
    ) -> Result<()>;

    /// Recompute and persist the aggregate job status from the recipient
    /// statuses, stamping `sent_at` the first time the message turns
    /// terminal. Returns the derived status.
    async fn finalise(&self, id: &MessageId) -> Result<JobStatus>;
}
