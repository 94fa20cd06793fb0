//! The worker loop.
//!
//! Each worker claims tasks from the shared queue, drives every recipient of
//! the claimed message through the retrying client, records outcomes in the
//! stores, and derives the final job status. A panic anywhere in the task
//! body is caught at the worker boundary, dead-lettered as a defect, and
//! never kills the worker.

use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures_util::FutureExt;
use shortwire_common::{
    Signal, outbound,
    model::MessageId,
    status::{ErrorKind, RecipientStatus},
};
use shortwire_store::{DeadLetterStore, MessageStore};
use tokio::sync::broadcast;

use crate::{
    client::RetryingClient,
    error::DispatchError,
    queue::{Task, TaskQueue},
};

/// The shared state one worker runs against.
#[derive(Debug)]
pub(crate) struct Processor {
    pub(crate) queue: Arc<TaskQueue>,
    pub(crate) client: Arc<RetryingClient>,
    pub(crate) messages: Arc<dyn MessageStore>,
    pub(crate) dead_letters: Arc<dyn DeadLetterStore>,
    pub(crate) dequeue_timeout: Duration,
}

impl Processor {
    /// Run one worker until shutdown.
    ///
    /// In-flight work finishes before the worker exits; the dequeue timeout
    /// bounds how long an idle worker takes to notice the signal.
    pub(crate) async fn run(self: Arc<Self>, worker_id: usize, mut shutdown: broadcast::Receiver<Signal>) {
        tracing::debug!(worker_id, "Worker started");

        loop {
            match shutdown.try_recv() {
                Ok(Signal::Shutdown) | Err(broadcast::error::TryRecvError::Closed) => {
                    tracing::debug!(worker_id, "Worker shutting down");
                    break;
                }
                Err(_) => {}
            }

            let Some(task) = self.queue.dequeue(self.dequeue_timeout).await else {
                continue;
            };

            self.process(worker_id, task).await;
        }
    }

    /// Process one claimed task: every recipient, serially, in order.
    async fn process(&self, worker_id: usize, task: Task) {
        tracing::info!(
            worker_id,
            message_id = %task.message_id,
            recipients = task.recipients.len(),
            "Processing message"
        );

        if let Err(error) = self.messages.mark_sending(&task.message_id).await {
            tracing::error!(
                message_id = %task.message_id,
                error = %error,
                "Failed to mark message as sending"
            );
        }

        for phone in &task.recipients {
            let outcome = AssertUnwindSafe(self.client.send_one(phone, &task.content))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(response)) => {
                    outbound!(
                        level = INFO,
                        "Delivered message {} to {phone} (status {})",
                        task.message_id,
                        response.status_code
                    );
                    self.record(&task.message_id, phone, RecipientStatus::Sent, None)
                        .await;
                }

                Ok(Err(error)) => {
                    self.fail_recipient(&task, phone, error.kind(), &error.to_string())
                        .await;
                }

                Err(panic) => {
                    let detail = panic_detail(panic.as_ref());
                    tracing::error!(
                        worker_id,
                        message_id = %task.message_id,
                        phone = %phone,
                        detail = %detail,
                        "Send attempt panicked"
                    );
                    let error = DispatchError::Defect(detail);
                    self.fail_recipient(&task, phone, ErrorKind::Defect, &error.to_string())
                        .await;
                }
            }
        }

        match self.messages.finalise(&task.message_id).await {
            Ok(status) => {
                tracing::info!(
                    message_id = %task.message_id,
                    status = %status,
                    "Message finished"
                );
            }
            Err(error) => {
                tracing::error!(
                    message_id = %task.message_id,
                    error = %error,
                    "Failed to finalise message"
                );
            }
        }
    }

    /// Dead-letter one failed recipient and mark it failed on the message.
    async fn fail_recipient(&self, task: &Task, phone: &str, kind: ErrorKind, detail: &str) {
        tracing::warn!(
            message_id = %task.message_id,
            phone = %phone,
            kind = %kind,
            error = %detail,
            "Recipient failed, dead-lettering"
        );

        if let Err(error) = self
            .dead_letters
            .add(
                Some(task.message_id.clone()),
                phone,
                &task.content,
                detail,
                kind,
            )
            .await
        {
            tracing::error!(
                message_id = %task.message_id,
                phone = %phone,
                error = %error,
                "Failed to record dead letter"
            );
        }

        self.record(
            &task.message_id,
            phone,
            RecipientStatus::Failed,
            Some(detail.to_string()),
        )
        .await;
    }

    /// Persist one recipient outcome; store failures are logged, never fatal.
    async fn record(
        &self,
        message_id: &MessageId,
        phone: &str,
        status: RecipientStatus,
        error_message: Option<String>,
    ) {
        if let Err(error) = self
            .messages
            .set_recipient_status(message_id, phone, status, error_message)
            .await
        {
            tracing::error!(
                message_id = %message_id,
                phone = %phone,
                error = %error,
                "Failed to record recipient status"
            );
        }
    }
}

/// Extract something printable from a panic payload.
fn panic_detail(panic: &(dyn std::any::Any + Send)) -> String {
    panic.downcast_ref::<&str>().map_or_else(
        || {
            panic
                .downcast_ref::<String>()
                .cloned()
                .unwrap_or_else(|| "non-string panic payload".to_string())
        },
        |s| (*s).to_string(),
    )
}
