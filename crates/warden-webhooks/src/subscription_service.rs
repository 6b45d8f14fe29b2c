//! Webhook subscription management.
//!
//! Validates endpoints, seals signing secrets with the platform codec and
//! enforces the per-workspace subscription limit.

use std::sync::Arc;

use chrono::Utc;
use warden_core::{SubscriptionId, WorkspaceId};
use warden_crypto::{generate_secret, EncryptedField, SecretCodec};

use crate::error::WebhookError;
use crate::models::{
    CreateSubscriptionRequest, CreatedSubscriptionResponse, SubscriptionResponse,
    UpdateSubscriptionRequest, WebhookSubscription,
};
use crate::store::SubscriptionStore;
use crate::validation;

/// Default maximum subscriptions per workspace.
pub const DEFAULT_MAX_SUBSCRIPTIONS: usize = 25;

#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn SubscriptionStore>,
    codec: Arc<SecretCodec>,
    max_subscriptions: usize,
    allow_http: bool,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn SubscriptionStore>, codec: Arc<SecretCodec>) -> Self {
        Self {
            store,
            codec,
            max_subscriptions: DEFAULT_MAX_SUBSCRIPTIONS,
            allow_http: false,
        }
    }

    #[must_use]
    pub fn with_max_subscriptions(mut self, max: usize) -> Self {
        self.max_subscriptions = max;
        self
    }

    /// Allow plain HTTP endpoints (development only).
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }

    /// Register an endpoint. The response carries the signing secret, which
    /// is never returned again.
    pub async fn create(
        &self,
        workspace_id: WorkspaceId,
        request: CreateSubscriptionRequest,
    ) -> Result<CreatedSubscriptionResponse, WebhookError> {
        validation::validate_name(&request.name)?;
        validation::validate_webhook_url(&request.url, self.allow_http)?;

        let count = self.store.count(workspace_id).await?;
        if count >= self.max_subscriptions {
            return Err(WebhookError::SubscriptionLimitExceeded {
                limit: self.max_subscriptions,
            });
        }

        let secret = match request.secret {
            Some(secret) if !secret.is_empty() => secret,
            _ => generate_secret(),
        };

        let now = Utc::now();
        let subscription = WebhookSubscription {
            id: SubscriptionId::new(),
            workspace_id,
            name: request.name.trim().to_string(),
            url: request.url,
            secret: EncryptedField::seal(&secret, &self.codec)?,
            events: request.events,
            enabled: true,
            created_at: now,
            updated_at: now,
        };
        let subscription = self.store.insert(subscription).await?;

        tracing::info!(
            target: "webhook_delivery",
            workspace_id = %workspace_id,
            subscription_id = %subscription.id,
            "Webhook subscription created"
        );

        Ok(CreatedSubscriptionResponse {
            subscription: SubscriptionResponse::from(&subscription),
            secret,
        })
    }

    /// Subscriptions of a workspace in creation order.
    pub async fn list(
        &self,
        workspace_id: WorkspaceId,
    ) -> Result<Vec<SubscriptionResponse>, WebhookError> {
        let subscriptions = self.store.list(workspace_id).await?;
        Ok(subscriptions.iter().map(SubscriptionResponse::from).collect())
    }

    pub async fn get(
        &self,
        workspace_id: WorkspaceId,
        id: SubscriptionId,
    ) -> Result<SubscriptionResponse, WebhookError> {
        let subscription = self.find(workspace_id, id).await?;
        Ok(SubscriptionResponse::from(&subscription))
    }

    /// Apply a partial update. A new secret is sealed before it is stored.
    pub async fn update(
        &self,
        workspace_id: WorkspaceId,
        id: SubscriptionId,
        request: UpdateSubscriptionRequest,
    ) -> Result<SubscriptionResponse, WebhookError> {
        let mut subscription = self.find(workspace_id, id).await?;

        if let Some(name) = request.name {
            validation::validate_name(&name)?;
            subscription.name = name.trim().to_string();
        }
        if let Some(url) = request.url {
            validation::validate_webhook_url(&url, self.allow_http)?;
            subscription.url = url;
        }
        if let Some(secret) = request.secret.filter(|s| !s.is_empty()) {
            subscription.secret = EncryptedField::seal(&secret, &self.codec)?;
        }
        if let Some(events) = request.events {
            subscription.events = events;
        }
        if let Some(enabled) = request.enabled {
            subscription.enabled = enabled;
        }
        subscription.updated_at = Utc::now();

        let subscription = self.store.update(subscription).await?;
        Ok(SubscriptionResponse::from(&subscription))
    }

    /// Stop deliveries while keeping the subscription for audit.
    pub async fn disable(
        &self,
        workspace_id: WorkspaceId,
        id: SubscriptionId,
    ) -> Result<SubscriptionResponse, WebhookError> {
        let request = UpdateSubscriptionRequest {
            enabled: Some(false),
            ..Default::default()
        };
        self.update(workspace_id, id, request).await
    }

    pub async fn delete(
        &self,
        workspace_id: WorkspaceId,
        id: SubscriptionId,
    ) -> Result<(), WebhookError> {
        if !self.store.delete(workspace_id, id).await? {
            return Err(WebhookError::SubscriptionNotFound);
        }
        tracing::info!(
            target: "webhook_delivery",
            workspace_id = %workspace_id,
            subscription_id = %id,
            "Webhook subscription deleted"
        );
        Ok(())
    }

    async fn find(
        &self,
        workspace_id: WorkspaceId,
        id: SubscriptionId,
    ) -> Result<WebhookSubscription, WebhookError> {
        self.store
            .find_by_id(workspace_id, id)
            .await?
            .ok_or(WebhookError::SubscriptionNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventSelector, WebhookEventType};
    use crate::store::MemorySubscriptionStore;
    use warden_crypto::MasterKey;

    fn service() -> (SubscriptionService, Arc<MemorySubscriptionStore>, Arc<SecretCodec>) {
        let store = Arc::new(MemorySubscriptionStore::new());
        let codec = Arc::new(SecretCodec::new(MasterKey::new([7u8; 32])));
        let service = SubscriptionService::new(store.clone(), codec.clone());
        (service, store, codec)
    }

    fn request(url: &str) -> CreateSubscriptionRequest {
        CreateSubscriptionRequest {
            name: "CRM".to_string(),
            url: url.to_string(),
            secret: None,
            events: EventSelector::All,
        }
    }

    #[tokio::test]
    async fn test_create_generates_and_seals_secret() {
        let (service, store, codec) = service();
        let ws = WorkspaceId::new();

        let created = service.create(ws, request("https://crm.example.com/hooks")).await.unwrap();
        assert!(created.secret.starts_with("whsec_"));

        let stored = store
            .find_by_id(ws, created.subscription.id)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.secret.ciphertext(), created.secret);
        assert_eq!(stored.secret.open(&codec).unwrap(), created.secret);
        assert!(stored.enabled);
    }

    #[tokio::test]
    async fn test_create_keeps_supplied_secret() {
        let (service, _, _) = service();
        let mut req = request("https://crm.example.com/hooks");
        req.secret = Some("my-own-signing-secret".to_string());

        let created = service.create(WorkspaceId::new(), req).await.unwrap();
        assert_eq!(created.secret, "my-own-signing-secret");
    }

    #[tokio::test]
    async fn test_limit_per_workspace() {
        let (service, _, _) = service();
        let service = service.with_max_subscriptions(2);
        let ws = WorkspaceId::new();

        service.create(ws, request("https://a.example.com/h")).await.unwrap();
        service.create(ws, request("https://b.example.com/h")).await.unwrap();
        let err = service
            .create(ws, request("https://c.example.com/h"))
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::SubscriptionLimitExceeded { limit: 2 }));

        // Another workspace has its own budget
        service
            .create(WorkspaceId::new(), request("https://c.example.com/h"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_rejects_unsafe_urls() {
        let (service, _, _) = service();
        let ws = WorkspaceId::new();

        let err = service.create(ws, request("http://crm.example.com/h")).await.unwrap_err();
        assert!(matches!(err, WebhookError::InvalidUrl(_)));
        let err = service.create(ws, request("https://10.1.2.3/h")).await.unwrap_err();
        assert!(matches!(err, WebhookError::SsrfDetected(_)));

        let service = service.with_allow_http(true);
        assert!(service.create(ws, request("http://crm.example.com/h")).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_and_disable() {
        let (service, store, codec) = service();
        let ws = WorkspaceId::new();
        let created = service.create(ws, request("https://crm.example.com/h")).await.unwrap();
        let id = created.subscription.id;

        let updated = service
            .update(
                ws,
                id,
                UpdateSubscriptionRequest {
                    url: Some("https://crm.example.com/v2".to_string()),
                    secret: Some("rotated-secret".to_string()),
                    events: Some(EventSelector::from_names(&["object.deleted"]).unwrap()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.url, "https://crm.example.com/v2");
        assert!(!updated.events.matches(WebhookEventType::ObjectCreated));

        let stored = store.find_by_id(ws, id).await.unwrap().unwrap();
        assert_eq!(stored.secret.open(&codec).unwrap(), "rotated-secret");

        let disabled = service.disable(ws, id).await.unwrap();
        assert!(!disabled.enabled);
        // Disabled subscriptions are retained
        assert_eq!(service.list(ws).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_other_workspace_cannot_reach_subscription() {
        let (service, _, _) = service();
        let ws = WorkspaceId::new();
        let created = service.create(ws, request("https://crm.example.com/h")).await.unwrap();
        let other = WorkspaceId::new();

        assert!(matches!(
            service.get(other, created.subscription.id).await,
            Err(WebhookError::SubscriptionNotFound)
        ));
        assert!(matches!(
            service.delete(other, created.subscription.id).await,
            Err(WebhookError::SubscriptionNotFound)
        ));
        service.delete(ws, created.subscription.id).await.unwrap();
        assert!(service.list(ws).await.unwrap().is_empty());
    }
}
