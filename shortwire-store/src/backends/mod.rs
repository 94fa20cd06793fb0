//! Store backend implementations.
//!
//! Only an in-memory backend ships here; database-backed stores implement
//! the same traits behind their own transactional guarantees.

mod memory;

pub use memory::{MemoryDeadLetterStore, MemoryMessageStore};
