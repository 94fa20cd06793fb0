//! Bounded FIFO task queue
//!
//! One task per submitted message. The queue is a bounded channel: producers
//! never block, they get an immediate [`DispatchError::QueueFull`] when the
//! queue is at capacity. Workers claim tasks through a shared receiver, so
//! claim order is exactly enqueue order.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use shortwire_common::model::MessageId;
use tokio::sync::mpsc;

use crate::error::DispatchError;

/// One unit of work: deliver `content` to every recipient of a message.
#[derive(Debug, Clone)]
pub struct Task {
    pub message_id: MessageId,
    /// Destination phone numbers, processed serially by the claiming worker.
    pub recipients: Vec<String>,
    /// Message body, shared rather than copied per task clone.
    pub content: Arc<str>,
}

/// Bounded multi-producer queue with FIFO claim order.
#[derive(Debug)]
pub struct TaskQueue {
    sender: mpsc::Sender<Task>,
    /// Workers take turns on one receiver, which preserves enqueue order.
    receiver: tokio::sync::Mutex<mpsc::Receiver<Task>>,
    depth: AtomicUsize,
    capacity: usize,
}

impl TaskQueue {
    /// Create a queue holding at most `capacity` tasks (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);

        Self {
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
            depth: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Enqueue a task without blocking.
    ///
    /// # Errors
    /// [`DispatchError::QueueFull`] when the queue is at capacity; the
    /// producer must back off. [`DispatchError::Stopped`] if the queue has
    /// shut down.
    pub fn enqueue(&self, task: Task) -> Result<(), DispatchError> {
        // The increment must land before the send: a worker can claim the
        // task and decrement the moment try_send publishes it, and the
        // counter must never dip below zero
        self.depth.fetch_add(1, Ordering::Relaxed);

        match self.sender.try_send(task) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.depth.fetch_sub(1, Ordering::Relaxed);
                Err(DispatchError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.depth.fetch_sub(1, Ordering::Relaxed);
                Err(DispatchError::Stopped)
            }
        }
    }

    /// Claim the oldest task, waiting at most `timeout`.
    ///
    /// Returns `None` on timeout so the caller can re-check its shutdown
    /// signal and come back.
    pub async fn dequeue(&self, timeout: Duration) -> Option<Task> {
        let mut receiver = self.receiver.lock().await;

        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Some(task)) => {
                self.depth.fetch_sub(1, Ordering::Relaxed);
                Some(task)
            }
            // Channel closed or deadline passed
            Ok(None) | Err(_) => None,
        }
    }

    /// Number of tasks currently queued (claimed tasks are not counted).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Maximum number of queued tasks.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
