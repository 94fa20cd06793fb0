//! Persistence collaborators for the shortwire dispatch pipeline
//!
//! This crate provides the durable-record primitives the core depends on:
//! - [`MessageStore`]: messages and their per-recipient delivery statuses
//! - [`DeadLetterStore`]: the append-only record of permanently-failed sends
//!
//! Both are object-safe async traits so the core never couples to a concrete
//! backend. Each operation is a single atomic mutation; a caller that sees an
//! error treats the write as not applied and re-derives state on the next
//! observation.

pub mod backends;
pub mod dead_letter;
pub mod error;
pub mod message_store;

pub use backends::{MemoryDeadLetterStore, MemoryMessageStore};
pub use dead_letter::{
    DEFAULT_MAX_RETRIES, DeadLetterId, DeadLetterRecord, DeadLetterStats, DeadLetterStore,
};
pub use error::{Result, StoreError};
pub use message_store::MessageStore;
