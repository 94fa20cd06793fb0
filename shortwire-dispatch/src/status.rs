//! Job status tracking and queue estimates.
//!
//! Everything here is derived on read. Queue position and completion
//! estimates are advisory: they are recomputed from the store and the
//! limiter on every call and never persisted, so a rate change simply flows
//! into the next read.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use serde::Serialize;
use shortwire_common::{model::MessageId, status::JobStatus};
use shortwire_store::{MessageStore, StoreError};

use crate::{queue::TaskQueue, rate_limiter::RateLimiter};

/// One read of a message's progress.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusView {
    pub job_status: JobStatus,
    /// 1-based position among pending messages; `None` once claimed.
    pub queue_position: Option<usize>,
    /// Advisory completion estimate; `None` once claimed.
    pub estimated_complete_at: Option<SystemTime>,
}

/// Snapshot of the dispatch pipeline for operators.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    /// Tasks currently waiting in the queue.
    pub queue_depth: usize,
    /// Configured sustained send rate.
    pub msgs_per_sec: f64,
    /// Messages whose job status is still pending.
    pub pending_messages: usize,
}

/// Read-side view over the message store and the rate limiter.
#[derive(Debug, Clone)]
pub struct JobStatusTracker {
    messages: Arc<dyn MessageStore>,
    limiter: Arc<RateLimiter>,
    queue: Arc<TaskQueue>,
}

impl JobStatusTracker {
    #[must_use]
    pub fn new(
        messages: Arc<dyn MessageStore>,
        limiter: Arc<RateLimiter>,
        queue: Arc<TaskQueue>,
    ) -> Self {
        Self {
            messages,
            limiter,
            queue,
        }
    }

    /// Look up one message's progress.
    ///
    /// Returns `Ok(None)` when the message does not exist; that is the
    /// caller's not-found signal, distinct from any failure state.
    ///
    /// While the message is still pending, the view carries its 1-based
    /// queue position (by submission order) and an estimated completion
    /// time of `now + recipients strictly ahead / rate`.
    pub async fn job_status(&self, id: &MessageId) -> Result<Option<JobStatusView>, StoreError> {
        let message = match self.messages.get(id).await {
            Ok(message) => message,
            Err(StoreError::MessageNotFound(_)) => return Ok(None),
            Err(error) => return Err(error),
        };

        if message.job_status != JobStatus::Pending {
            return Ok(Some(JobStatusView {
                job_status: message.job_status,
                queue_position: None,
                estimated_complete_at: None,
            }));
        }

        let pending = self.messages.pending().await?;

        // Message IDs are ULIDs, so ID order is submission order
        let position = pending.iter().filter(|m| m.id <= message.id).count();
        let recipients_ahead: usize = pending
            .iter()
            .filter(|m| m.id < message.id)
            .map(shortwire_common::model::Message::recipient_count)
            .sum();

        let rate = self.limiter.rate_per_second();
        let estimated_complete_at = if rate > 0.0 {
            // Advisory only; precision loss is acceptable here
            #[allow(clippy::cast_precision_loss)]
            let wait = Duration::from_secs_f64(recipients_ahead as f64 / rate);
            Some(SystemTime::now() + wait)
        } else {
            None
        };

        Ok(Some(JobStatusView {
            job_status: message.job_status,
            queue_position: Some(position),
            estimated_complete_at,
        }))
    }

    /// Snapshot the pipeline: queue depth, configured rate, and how many
    /// messages are still pending.
    pub async fn queue_status(&self) -> Result<QueueStatus, StoreError> {
        let pending = self.messages.pending().await?;

        Ok(QueueStatus {
            queue_depth: self.queue.depth(),
            msgs_per_sec: self.limiter.rate_per_second(),
            pending_messages: pending.len(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use shortwire_common::model::Message;
    use shortwire_store::{MemoryMessageStore, MessageStore};

    use super::*;
    use crate::rate_limiter::RateLimitConfig;

    fn tracker(messages: Arc<dyn MessageStore>, rate: f64) -> JobStatusTracker {
        let limiter = Arc::new(RateLimiter::new(&RateLimitConfig {
            messages_per_second: rate,
            burst_size: 1,
            acquire_poll_interval_ms: 25,
        }));
        JobStatusTracker::new(messages, limiter, Arc::new(TaskQueue::new(10)))
    }

    fn spaced_message(phones: &[&str]) -> Message {
        // ULID ordering needs distinct timestamps
        std::thread::sleep(std::time::Duration::from_millis(2));
        Message::new(phones.iter().copied(), "test content")
    }

    #[tokio::test]
    async fn missing_message_reads_as_none() {
        let store = Arc::new(MemoryMessageStore::new());
        let tracker = tracker(store, 10.0);

        let view = tracker.job_status(&MessageId::generate()).await.unwrap();
        assert!(view.is_none());
    }

    #[tokio::test]
    async fn pending_message_has_position_and_estimate() {
        let store = Arc::new(MemoryMessageStore::new());

        let first = spaced_message(&["1", "2", "3"]);
        let second = spaced_message(&["4"]);
        store.insert(&first).await.unwrap();
        store.insert(&second).await.unwrap();

        let tracker = tracker(store, 1.0);

        let view = tracker.job_status(&first.id).await.unwrap().unwrap();
        assert_eq!(view.job_status, JobStatus::Pending);
        assert_eq!(view.queue_position, Some(1));

        let view = tracker.job_status(&second.id).await.unwrap().unwrap();
        assert_eq!(view.queue_position, Some(2));

        // Three recipients ahead at 1 msg/sec: roughly three seconds out
        let eta = view.estimated_complete_at.unwrap();
        let wait = eta.duration_since(SystemTime::now()).unwrap();
        assert!(wait >= Duration::from_secs(2) && wait <= Duration::from_secs(4));
    }

    #[tokio::test]
    async fn claimed_message_has_no_position() {
        let store = Arc::new(MemoryMessageStore::new());

        let message = spaced_message(&["1"]);
        store.insert(&message).await.unwrap();
        store.mark_sending(&message.id).await.unwrap();

        let tracker = tracker(store, 10.0);

        let view = tracker.job_status(&message.id).await.unwrap().unwrap();
        assert_eq!(view.job_status, JobStatus::Sending);
        assert_eq!(view.queue_position, None);
        assert!(view.estimated_complete_at.is_none());
    }

    #[tokio::test]
    async fn queue_status_snapshot() {
        let store = Arc::new(MemoryMessageStore::new());

        store.insert(&spaced_message(&["1"])).await.unwrap();
        store.insert(&spaced_message(&["2"])).await.unwrap();

        let tracker = tracker(store, 5.0);

        let status = tracker.queue_status().await.unwrap();
        assert_eq!(status.queue_depth, 0);
        assert!((status.msgs_per_sec - 5.0).abs() < f64::EPSILON);
        assert_eq!(status.pending_messages, 2);
    }
}
