//! In-memory subscription store for tests and local development.

use async_trait::async_trait;
use tokio::sync::RwLock;
use warden_core::{SubscriptionId, WorkspaceId};
use warden_db::DbError;

use super::SubscriptionStore;
use crate::models::{WebhookEventType, WebhookSubscription};

#[derive(Debug, Default)]
pub struct MemorySubscriptionStore {
    subscriptions: RwLock<Vec<WebhookSubscription>>,
}

impl MemorySubscriptionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn insert(&self, subscription: WebhookSubscription) -> Result<WebhookSubscription, DbError> {
        let mut guard = self.subscriptions.write().await;
        if guard.iter().any(|s| s.id == subscription.id) {
            return Err(DbError::Conflict(format!("subscription {} exists", subscription.id)));
        }
        guard.push(subscription.clone());
        Ok(subscription)
    }

    async fn update(&self, subscription: WebhookSubscription) -> Result<WebhookSubscription, DbError> {
        let mut guard = self.subscriptions.write().await;
        let slot = guard
            .iter_mut()
            .find(|s| s.id == subscription.id && s.workspace_id == subscription.workspace_id)
            .ok_or_else(|| DbError::NotFound(format!("subscription {}", subscription.id)))?;
        *slot = subscription.clone();
        Ok(subscription)
    }

    async fn find_by_id(
        &self,
        workspace_id: WorkspaceId,
        id: SubscriptionId,
    ) -> Result<Option<WebhookSubscription>, DbError> {
        let guard = self.subscriptions.read().await;
        Ok(guard
            .iter()
            .find(|s| s.id == id && s.workspace_id == workspace_id)
            .cloned())
    }

    async fn list(&self, workspace_id: WorkspaceId) -> Result<Vec<WebhookSubscription>, DbError> {
        let guard = self.subscriptions.read().await;
        Ok(guard
            .iter()
            .filter(|s| s.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn count(&self, workspace_id: WorkspaceId) -> Result<usize, DbError> {
        let guard = self.subscriptions.read().await;
        Ok(guard.iter().filter(|s| s.workspace_id == workspace_id).count())
    }

    async fn delete(&self, workspace_id: WorkspaceId, id: SubscriptionId) -> Result<bool, DbError> {
        let mut guard = self.subscriptions.write().await;
        let before = guard.len();
        guard.retain(|s| !(s.id == id && s.workspace_id == workspace_id));
        Ok(guard.len() != before)
    }

    async fn find_enabled_for_event(
        &self,
        workspace_id: WorkspaceId,
        event_type: WebhookEventType,
    ) -> Result<Vec<WebhookSubscription>, DbError> {
        let guard = self.subscriptions.read().await;
        Ok(guard
            .iter()
            .filter(|s| s.workspace_id == workspace_id && s.enabled && s.events.matches(event_type))
            .cloned()
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
