//! Persistence of webhook subscriptions.
//!
//! Subscriptions are platform records, stored next to the workspaces rather
//! than in a workspace database. Every lookup is scoped by workspace id.

use async_trait::async_trait;
use warden_core::{SubscriptionId, WorkspaceId};
use warden_db::DbError;

use crate::models::{WebhookEventType, WebhookSubscription};

pub mod memory;
pub mod postgres;

pub use memory::MemorySubscriptionStore;
pub use postgres::PgSubscriptionStore;

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn insert(&self, subscription: WebhookSubscription) -> Result<WebhookSubscription, DbError>;

    /// Replace a stored subscription. Fails with [`DbError::NotFound`] when
    /// it does not exist in that workspace.
    async fn update(&self, subscription: WebhookSubscription) -> Result<WebhookSubscription, DbError>;

    async fn find_by_id(
        &self,
        workspace_id: WorkspaceId,
        id: SubscriptionId,
    ) -> Result<Option<WebhookSubscription>, DbError>;

    /// All subscriptions of a workspace in creation order.
    async fn list(&self, workspace_id: WorkspaceId) -> Result<Vec<WebhookSubscription>, DbError>;

    async fn count(&self, workspace_id: WorkspaceId) -> Result<usize, DbError>;

    /// Returns whether a subscription was removed.
    async fn delete(&self, workspace_id: WorkspaceId, id: SubscriptionId) -> Result<bool, DbError>;

    /// Enabled subscriptions receiving `event_type`, in creation order.
    async fn find_enabled_for_event(
        &self,
        workspace_id: WorkspaceId,
        event_type: WebhookEventType,
    ) -> Result<Vec<WebhookSubscription>, DbError>;

    fn backend_name(&self) -> &'static str;
}
