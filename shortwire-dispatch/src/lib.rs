//! Dispatch core for outbound SMS
//!
//! This crate provides the pipeline between producers and the external SMS
//! gateway:
//! - A bounded FIFO task queue with a fixed worker pool
//! - A shared token-bucket rate limiter bounding the aggregate send rate
//! - A retrying gateway client with exponential backoff
//! - Dead-lettering of permanently failed sends
//! - Read-side job status and queue estimates

mod client;
mod config;
mod error;
mod gateway;
mod processor;
mod queue;
mod rate_limiter;
mod retry;
mod service;
mod status;

pub use client::RetryingClient;
pub use config::DispatchConfig;
pub use error::{DispatchError, RejectionError, TransientError};
pub use gateway::{Gateway, GatewayError, GatewayResponse};
pub use queue::{Task, TaskQueue};
pub use rate_limiter::{RateLimitConfig, RateLimitStats, RateLimiter};
pub use retry::RetryPolicy;
pub use service::Dispatcher;
pub use status::{JobStatusTracker, JobStatusView, QueueStatus};
