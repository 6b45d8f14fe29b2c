//! Postgres-backed subscription store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use warden_core::{SubscriptionId, WorkspaceId};
use warden_crypto::EncryptedField;
use warden_db::DbError;

use super::SubscriptionStore;
use crate::models::{EventSelector, WebhookEventType, WebhookSubscription, ALL_EVENTS};

const SELECT_SUBSCRIPTION: &str = r#"
    SELECT id, workspace_id, name, url, secret, event_types, enabled, created_at, updated_at
    FROM warden_webhook_subscriptions
"#;

#[derive(Debug, FromRow)]
struct SubscriptionRow {
    id: Uuid,
    workspace_id: Uuid,
    name: String,
    url: String,
    secret: String,
    event_types: Vec<String>,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for WebhookSubscription {
    type Error = DbError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let events = EventSelector::from_names(row.event_types.as_slice())
            .map_err(|e| DbError::ValidationFailed(format!("subscription {}: {e}", row.id)))?;
        Ok(Self {
            id: SubscriptionId::from_uuid(row.id),
            workspace_id: WorkspaceId::from_uuid(row.workspace_id),
            name: row.name,
            url: row.url,
            secret: EncryptedField::from_ciphertext(row.secret),
            events,
            enabled: row.enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the subscription table if it is missing.
    pub async fn ensure_schema(&self) -> Result<(), DbError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS warden_webhook_subscriptions (
                id UUID PRIMARY KEY,
                workspace_id UUID NOT NULL,
                name VARCHAR(255) NOT NULL,
                url VARCHAR(2048) NOT NULL,
                secret TEXT NOT NULL,
                event_types TEXT[] NOT NULL,
                enabled BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS warden_webhook_subscriptions_workspace
            ON warden_webhook_subscriptions (workspace_id, created_at)
            "#,
        ];
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(DbError::QueryFailed)?;
        }
        Ok(())
    }

    async fn fetch_all(
        &self,
        query: &str,
        workspace_id: WorkspaceId,
        event_type: Option<WebhookEventType>,
    ) -> Result<Vec<WebhookSubscription>, DbError> {
        let mut q = sqlx::query_as::<_, SubscriptionRow>(query).bind(workspace_id.into_uuid());
        if let Some(event_type) = event_type {
            q = q.bind(event_type.as_str()).bind(ALL_EVENTS);
        }
        q.fetch_all(&self.pool)
            .await
            .map_err(DbError::QueryFailed)?
            .into_iter()
            .map(WebhookSubscription::try_from)
            .collect()
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn insert(&self, sub: WebhookSubscription) -> Result<WebhookSubscription, DbError> {
        sqlx::query(
            r#"
            INSERT INTO warden_webhook_subscriptions (
                id, workspace_id, name, url, secret, event_types, enabled, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(sub.id.into_uuid())
        .bind(sub.workspace_id.into_uuid())
        .bind(&sub.name)
        .bind(&sub.url)
        .bind(sub.secret.ciphertext())
        .bind(sub.events.names())
        .bind(sub.enabled)
        .bind(sub.created_at)
        .bind(sub.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::QueryFailed)?;

        Ok(sub)
    }

    async fn update(&self, sub: WebhookSubscription) -> Result<WebhookSubscription, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE warden_webhook_subscriptions
            SET name = $3, url = $4, secret = $5, event_types = $6, enabled = $7, updated_at = $8
            WHERE id = $1 AND workspace_id = $2
            "#,
        )
        .bind(sub.id.into_uuid())
        .bind(sub.workspace_id.into_uuid())
        .bind(&sub.name)
        .bind(&sub.url)
        .bind(sub.secret.ciphertext())
        .bind(sub.events.names())
        .bind(sub.enabled)
        .bind(sub.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::QueryFailed)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("subscription {}", sub.id)));
        }
        Ok(sub)
    }

    async fn find_by_id(
        &self,
        workspace_id: WorkspaceId,
        id: SubscriptionId,
    ) -> Result<Option<WebhookSubscription>, DbError> {
        let query = format!("{SELECT_SUBSCRIPTION} WHERE id = $1 AND workspace_id = $2");
        sqlx::query_as::<_, SubscriptionRow>(&query)
            .bind(id.into_uuid())
            .bind(workspace_id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::QueryFailed)?
            .map(WebhookSubscription::try_from)
            .transpose()
    }

    async fn list(&self, workspace_id: WorkspaceId) -> Result<Vec<WebhookSubscription>, DbError> {
        let query =
            format!("{SELECT_SUBSCRIPTION} WHERE workspace_id = $1 ORDER BY created_at ASC, id ASC");
        self.fetch_all(&query, workspace_id, None).await
    }

    async fn count(&self, workspace_id: WorkspaceId) -> Result<usize, DbError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM warden_webhook_subscriptions WHERE workspace_id = $1",
        )
        .bind(workspace_id.into_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::QueryFailed)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn delete(&self, workspace_id: WorkspaceId, id: SubscriptionId) -> Result<bool, DbError> {
        let result = sqlx::query(
            "DELETE FROM warden_webhook_subscriptions WHERE id = $1 AND workspace_id = $2",
        )
        .bind(id.into_uuid())
        .bind(workspace_id.into_uuid())
        .execute(&self.pool)
        .await
        .map_err(DbError::QueryFailed)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_enabled_for_event(
        &self,
        workspace_id: WorkspaceId,
        event_type: WebhookEventType,
    ) -> Result<Vec<WebhookSubscription>, DbError> {
        let query = format!(
            "{SELECT_SUBSCRIPTION} \
             WHERE workspace_id = $1 AND enabled \
               AND ($2 = ANY(event_types) OR $3 = ANY(event_types)) \
             ORDER BY created_at ASC, id ASC"
        );
        self.fetch_all(&query, workspace_id, Some(event_type)).await
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
