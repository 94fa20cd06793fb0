//! Error types for the shortwire-store crate.

use shortwire_common::model::MessageId;
use thiserror::Error;

use crate::dead_letter::DeadLetterId;

/// Top-level store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Message not found in the store.
    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    /// Dead-letter record not found in the store.
    #[error("Dead letter not found: {0}")]
    DeadLetterNotFound(DeadLetterId),

    /// Recipient not found within a message.
    #[error("Recipient {phone} not found on message {message_id}")]
    RecipientNotFound { message_id: MessageId, phone: String },

    /// Internal error (lock poisoning, backend failure, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

// Convenience conversion for lock poisoning
impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}
