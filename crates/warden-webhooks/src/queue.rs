//! Hand-off between request handling and the delivery worker.
//!
//! Enqueueing never blocks and never awaits: a request that mutated data
//! must not wait for, or fail because of, webhook delivery.

use std::fmt;

use tokio::sync::mpsc;
use warden_core::{SubscriptionId, WorkspaceId};
use warden_crypto::EncryptedField;

/// One envelope bound for one subscription.
#[derive(Clone)]
pub struct DeliveryTask {
    /// Envelope JSON, sent byte for byte.
    pub event: String,
    pub schema_version: u32,
    pub url: String,
    /// Signing secret, still sealed under the master key.
    pub secret: EncryptedField<String>,
    pub workspace_id: WorkspaceId,
    pub subscription_id: SubscriptionId,
    /// Attempts made so far.
    pub attempt: u32,
}

impl fmt::Debug for DeliveryTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryTask")
            .field("url", &self.url)
            .field("workspace_id", &self.workspace_id)
            .field("subscription_id", &self.subscription_id)
            .field("schema_version", &self.schema_version)
            .field("attempt", &self.attempt)
            .field("event_bytes", &self.event.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Delivery queue is full")]
    Full,

    #[error("Delivery queue is closed")]
    Closed,
}

/// Asynchronous task queue consumed by the delivery worker.
pub trait TaskQueue: Send + Sync {
    fn enqueue(&self, task: DeliveryTask) -> Result<(), QueueError>;
}

/// Bounded in-process queue backed by a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelTaskQueue {
    sender: mpsc::Sender<DeliveryTask>,
}

impl ChannelTaskQueue {
    /// Create a queue holding up to `capacity` pending tasks, and the
    /// receiver to hand to the worker.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DeliveryTask>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl TaskQueue for ChannelTaskQueue {
    fn enqueue(&self, task: DeliveryTask) -> Result<(), QueueError> {
        self.sender.try_send(task).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }
}
