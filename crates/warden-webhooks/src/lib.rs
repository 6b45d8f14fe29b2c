//! Webhook notifications for workspace lifecycle events.
//!
//! A domain mutation calls [`WebhookTrigger::trigger`], which looks up the
//! enabled subscriptions of the workspace, projects the object through its
//! [`WebhookSchema`] and hands one [`DeliveryTask`] per subscription to a
//! [`TaskQueue`]. The [`DeliveryWorker`] drains the queue, signs each payload
//! with the subscription secret and retries transient failures.

pub mod envelope;
pub mod error;
pub mod models;
pub mod queue;
pub mod schema;
pub mod store;
pub mod subscription_service;
pub mod trigger;
pub mod validation;
pub mod worker;

pub use envelope::WebhookEnvelope;
pub use error::{DeliveryError, WebhookError};
pub use models::{EventSelector, WebhookEventType, WebhookSubscription};
pub use queue::{ChannelTaskQueue, DeliveryTask, QueueError, TaskQueue};
pub use schema::{ClientSchema, WebhookSchema};
pub use store::{MemorySubscriptionStore, PgSubscriptionStore, SubscriptionStore};
pub use subscription_service::SubscriptionService;
pub use trigger::WebhookTrigger;
pub use worker::{DeliveryOutcome, DeliveryWorker, FailedDelivery, FailedDeliveryLog, RetryPolicy};
