//! The dispatch service facade.
//!
//! A [`Dispatcher`] owns the whole pipeline: the queue, the rate limiter,
//! the retrying client, the worker pool, and the read-side surfaces.
//! Everything is wired explicitly at construction; there is no global state.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use shortwire_common::{Signal, internal, model::Message, model::MessageId};
use shortwire_store::{
    DeadLetterId, DeadLetterRecord, DeadLetterStats, DeadLetterStore, MessageStore,
};
use tokio::{sync::broadcast, task::JoinHandle};

use crate::{
    client::RetryingClient,
    config::DispatchConfig,
    error::{DispatchError, RejectionError},
    gateway::Gateway,
    processor::Processor,
    queue::{Task, TaskQueue},
    rate_limiter::RateLimiter,
    status::{JobStatusTracker, JobStatusView, QueueStatus},
};

/// The dispatch pipeline.
///
/// Constructed once with its gateway and stores, [`Dispatcher::start`]
/// spawns the worker pool immediately. Producers call [`Dispatcher::submit`]
/// and get backpressure as an error rather than blocking. [`Dispatcher::stop`]
/// drains cooperatively: in-flight sends finish, queued tasks that no worker
/// has claimed stay in their stores as pending.
#[derive(Debug)]
pub struct Dispatcher {
    queue: Arc<TaskQueue>,
    messages: Arc<dyn MessageStore>,
    dead_letters: Arc<dyn DeadLetterStore>,
    tracker: JobStatusTracker,
    shutdown: broadcast::Sender<Signal>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl Dispatcher {
    /// Wire up the pipeline and spawn the worker pool.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(
        config: DispatchConfig,
        gateway: Arc<dyn Gateway>,
        messages: Arc<dyn MessageStore>,
        dead_letters: Arc<dyn DeadLetterStore>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        let queue = Arc::new(TaskQueue::new(config.queue_capacity));
        let client = Arc::new(RetryingClient::new(
            gateway,
            limiter.clone(),
            config.retry.clone(),
            config.acquire_timeout(),
            config.request_timeout(),
        ));
        let tracker = JobStatusTracker::new(messages.clone(), limiter, queue.clone());

        let (shutdown, _) = broadcast::channel(1);

        let processor = Arc::new(Processor {
            queue: queue.clone(),
            client,
            messages: messages.clone(),
            dead_letters: dead_letters.clone(),
            dequeue_timeout: config.dequeue_timeout(),
        });

        let workers = (0..config.workers.max(1))
            .map(|worker_id| {
                tokio::spawn(processor.clone().run(worker_id, shutdown.subscribe()))
            })
            .collect();

        internal!(
            level = INFO,
            "Dispatcher started: {} workers, queue capacity {}, {} msg/sec",
            config.workers.max(1),
            config.queue_capacity,
            config.rate_limit.messages_per_second
        );

        Self {
            queue,
            messages,
            dead_letters,
            tracker,
            shutdown,
            workers: tokio::sync::Mutex::new(workers),
            stopped: AtomicBool::new(false),
        }
    }

    /// Submit one message for dispatch to the given recipients.
    ///
    /// The message and its recipients are persisted as pending first, then
    /// the task is enqueued, so a successfully submitted message is always
    /// observable through [`Dispatcher::job_status`].
    ///
    /// # Errors
    /// [`DispatchError::QueueFull`] when the queue is at capacity; the
    /// message is then recorded as failed rather than left as a phantom
    /// pending entry. [`DispatchError::Rejected`] for an empty recipient
    /// list, [`DispatchError::Stopped`] after [`Dispatcher::stop`].
    pub async fn submit<I, S>(
        &self,
        recipients: I,
        content: &str,
    ) -> Result<MessageId, DispatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(DispatchError::Stopped);
        }

        let message = Message::new(recipients, content);
        if message.recipients.is_empty() {
            return Err(DispatchError::Rejected(RejectionError::EmptyRecipients));
        }

        self.messages.insert(&message).await?;

        let task = Task {
            message_id: message.id.clone(),
            recipients: message.recipients.iter().map(|r| r.phone.clone()).collect(),
            content: Arc::from(message.content.as_str()),
        };

        if let Err(error) = self.queue.enqueue(task) {
            // The message is already persisted; fail it so it neither skews
            // queue positions nor reads as forever pending
            self.fail_submitted(&message, &error).await;
            return Err(error);
        }

        tracing::info!(
            message_id = %message.id,
            recipients = message.recipient_count(),
            depth = self.queue.depth(),
            "Message submitted"
        );

        Ok(message.id)
    }

    async fn fail_submitted(&self, message: &Message, error: &DispatchError) {
        let detail = error.to_string();

        for recipient in &message.recipients {
            if let Err(store_error) = self
                .messages
                .set_recipient_status(
                    &message.id,
                    &recipient.phone,
                    shortwire_common::status::RecipientStatus::Failed,
                    Some(detail.clone()),
                )
                .await
            {
                tracing::error!(
                    message_id = %message.id,
                    error = %store_error,
                    "Failed to record rejected submission"
                );
            }
        }

        if let Err(store_error) = self.messages.finalise(&message.id).await {
            tracing::error!(
                message_id = %message.id,
                error = %store_error,
                "Failed to finalise rejected submission"
            );
        }
    }

    /// One message's progress; `Ok(None)` when the message does not exist.
    pub async fn job_status(
        &self,
        id: &MessageId,
    ) -> Result<Option<JobStatusView>, DispatchError> {
        Ok(self.tracker.job_status(id).await?)
    }

    /// Snapshot of the pipeline for operators.
    pub async fn queue_status(&self) -> Result<QueueStatus, DispatchError> {
        Ok(self.tracker.queue_status().await?)
    }

    /// Number of tasks currently waiting in the queue.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    /// Dead-letter records, oldest first, optionally filtered by status.
    pub async fn dead_letters(
        &self,
        status: Option<shortwire_common::status::DeadLetterStatus>,
    ) -> Result<Vec<DeadLetterRecord>, DispatchError> {
        Ok(self.dead_letters.list(status).await?)
    }

    /// Re-drive one dead letter as a fresh single-recipient message.
    ///
    /// Returns `false` without side effects when the record is missing, not
    /// pending, or out of retries. On success the retry counter is bumped,
    /// the content is re-submitted through the normal pipeline, and the
    /// record transitions to `Retried`.
    ///
    /// # Errors
    /// If the re-submission itself fails (queue full, dispatcher stopped),
    /// the error propagates; the record keeps its bumped retry counter and
    /// stays pending, recording that an attempt was made.
    pub async fn retry_dead_letter(&self, id: &DeadLetterId) -> Result<bool, DispatchError> {
        if !self.dead_letters.retry(id).await? {
            return Ok(false);
        }

        let record = self.dead_letters.get(id).await?;
        let message_id = self.submit([record.phone.as_str()], &record.content).await?;

        self.dead_letters.mark_retried(id).await?;

        tracing::info!(
            dead_letter_id = %id,
            message_id = %message_id,
            retry_count = record.retry_count,
            "Dead letter re-driven"
        );

        Ok(true)
    }

    /// Give up on one dead letter. Returns `false` when the record is
    /// missing or already abandoned.
    pub async fn abandon_dead_letter(&self, id: &DeadLetterId) -> Result<bool, DispatchError> {
        let abandoned = self.dead_letters.mark_abandoned(id).await?;

        if abandoned {
            tracing::info!(dead_letter_id = %id, "Dead letter abandoned");
        }

        Ok(abandoned)
    }

    /// Dead-letter counts by lifecycle status.
    pub async fn dead_letter_stats(&self) -> Result<DeadLetterStats, DispatchError> {
        Ok(self.dead_letters.stats().await?)
    }

    /// Stop accepting work and drain the worker pool.
    ///
    /// Workers finish whatever task they have claimed, then exit. Idempotent;
    /// a second call returns immediately.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        internal!(level = INFO, "Dispatcher stopping");

        // Send fails only when every worker is already gone
        let _ = self.shutdown.send(Signal::Shutdown);

        let workers = {
            let mut guard = self.workers.lock().await;
            std::mem::take(&mut *guard)
        };

        for (worker_id, handle) in workers.into_iter().enumerate() {
            if let Err(error) = handle.await {
                tracing::error!(worker_id, error = %error, "Worker exited abnormally");
            }
        }

        internal!(level = INFO, "Dispatcher stopped");
    }
}
