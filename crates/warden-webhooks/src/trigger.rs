//! Fan-out of domain events to subscribed endpoints.

use std::sync::Arc;

use warden_core::WorkspaceId;

use crate::envelope::WebhookEnvelope;
use crate::error::WebhookError;
use crate::models::WebhookEventType;
use crate::queue::{DeliveryTask, TaskQueue};
use crate::schema::WebhookSchema;
use crate::store::SubscriptionStore;

#[derive(Clone)]
pub struct WebhookTrigger {
    store: Arc<dyn SubscriptionStore>,
    queue: Arc<dyn TaskQueue>,
}

impl WebhookTrigger {
    pub fn new(store: Arc<dyn SubscriptionStore>, queue: Arc<dyn TaskQueue>) -> Self {
        Self { store, queue }
    }

    /// Enqueue one delivery of `object` per enabled subscription of the
    /// workspace that receives `event_type`. Returns how many were enqueued.
    ///
    /// Nothing is serialized when no subscription matches. A task the queue
    /// refuses is logged and skipped; the others still go out.
    pub async fn trigger<S: WebhookSchema>(
        &self,
        event_type: WebhookEventType,
        object: &S::Object,
        workspace_id: WorkspaceId,
    ) -> Result<usize, WebhookError> {
        let subscriptions = self
            .store
            .find_enabled_for_event(workspace_id, event_type)
            .await?;

        if subscriptions.is_empty() {
            tracing::debug!(
                target: "webhook_delivery",
                workspace_id = %workspace_id,
                event_type = %event_type,
                object = S::OBJECT,
                "No enabled subscriptions match event type"
            );
            return Ok(0);
        }

        let event = WebhookEnvelope::build::<S>(event_type, object)?.to_json()?;

        let mut enqueued = 0;
        for subscription in &subscriptions {
            let task = DeliveryTask {
                event: event.clone(),
                schema_version: S::VERSION,
                url: subscription.url.clone(),
                secret: subscription.secret.clone(),
                workspace_id,
                subscription_id: subscription.id,
                attempt: 0,
            };
            match self.queue.enqueue(task) {
                Ok(()) => enqueued += 1,
                Err(e) => {
                    tracing::warn!(
                        target: "webhook_delivery",
                        workspace_id = %workspace_id,
                        subscription_id = %subscription.id,
                        event_type = %event_type,
                        error = %e,
                        "Webhook delivery dropped"
                    );
                }
            }
        }

        tracing::info!(
            target: "webhook_delivery",
            workspace_id = %workspace_id,
            event_type = %event_type,
            object = S::OBJECT,
            subscription_count = subscriptions.len(),
            enqueued,
            "Webhook event dispatched"
        );

        Ok(enqueued)
    }
}
