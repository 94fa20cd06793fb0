//! Shared vocabulary for the shortwire dispatch pipeline
//!
//! This crate holds the types every other crate speaks in:
//! - Message and recipient models, with ULID identifiers
//! - Closed status enumerations and the job-status derivation rule
//! - Structured-logging initialisation and log macros
//! - The cooperative shutdown [`Signal`]

pub mod logging;
pub mod model;
pub mod status;

pub use tracing;

/// Signal broadcast to long-running components for cooperative shutdown.
///
/// In-flight work is allowed to finish; nothing is interrupted mid-send.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
}
