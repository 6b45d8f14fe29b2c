//! OAuth client model, stored in the workspace database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use warden_core::{ClientId, WorkspaceId};
use warden_crypto::{generate_token, EncryptedField, SecretCodec};

use crate::engine::WorkspaceEngine;
use crate::error::DbError;

use super::{parse_id, parse_timestamp};

/// OAuth2 client type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    /// Can keep a secret.
    Confidential,
    /// Runs on the user's device (SPA, mobile).
    Public,
}

impl std::fmt::Display for ClientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientType::Confidential => write!(f, "confidential"),
            ClientType::Public => write!(f, "public"),
        }
    }
}

impl std::str::FromStr for ClientType {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "confidential" => Ok(ClientType::Confidential),
            "public" => Ok(ClientType::Public),
            _ => Err(DbError::ValidationFailed(format!("Invalid client type: {s}"))),
        }
    }
}

/// An OAuth client registered in a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: ClientId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    /// Public client identifier used in OAuth flows.
    pub client_id: String,
    /// Only confidential clients have a secret.
    pub client_secret: Option<EncryptedField<String>>,
    pub client_type: ClientType,
    pub redirect_uris: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a client.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateClient {
    pub name: String,
    pub client_type: ClientType,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, FromRow)]
struct ClientRow {
    id: String,
    workspace_id: String,
    name: String,
    client_id: String,
    client_secret: Option<String>,
    client_type: String,
    redirect_uris: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ClientRow> for Client {
    type Error = DbError;

    fn try_from(row: ClientRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id(&row.id)?,
            workspace_id: parse_id(&row.workspace_id)?,
            name: row.name,
            client_id: row.client_id,
            client_secret: row.client_secret.map(EncryptedField::from_ciphertext),
            client_type: row.client_type.parse()?,
            redirect_uris: serde_json::from_str(&row.redirect_uris)
                .map_err(|e| DbError::ValidationFailed(format!("redirect_uris: {e}")))?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

const SELECT_CLIENT: &str = r#"
    SELECT id, workspace_id, name, client_id, client_secret, client_type, redirect_uris,
           created_at, updated_at
    FROM warden_clients
"#;

impl Client {
    /// Register a client. Returns the plaintext secret of a confidential
    /// client alongside it; only the sealed form is stored.
    pub async fn create(
        engine: &WorkspaceEngine,
        codec: &SecretCodec,
        input: CreateClient,
    ) -> Result<(Self, Option<String>), DbError> {
        if input.name.trim().is_empty() {
            return Err(DbError::ValidationFailed("client name must not be empty".to_string()));
        }

        let secret = match input.client_type {
            ClientType::Confidential => Some(generate_token("", 32)),
            ClientType::Public => None,
        };
        let sealed = secret
            .as_ref()
            .map(|s| EncryptedField::seal(s, codec))
            .transpose()?;

        let now = Utc::now();
        let client = Self {
            id: ClientId::new(),
            workspace_id: engine.workspace_id(),
            name: input.name,
            client_id: generate_token("", 16),
            client_secret: sealed,
            client_type: input.client_type,
            redirect_uris: input.redirect_uris,
            created_at: now,
            updated_at: now,
        };

        let redirect_uris = serde_json::to_string(&client.redirect_uris)
            .map_err(|e| DbError::ValidationFailed(e.to_string()))?;
        let sql = engine.sql(
            r#"
            INSERT INTO warden_clients (
                id, workspace_id, name, client_id, client_secret, client_type, redirect_uris,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        );
        sqlx::query(&sql)
            .bind(client.id.to_string())
            .bind(client.workspace_id.to_string())
            .bind(client.name.clone())
            .bind(client.client_id.clone())
            .bind(client.client_secret.as_ref().map(|s| s.ciphertext().to_string()))
            .bind(client.client_type.to_string())
            .bind(redirect_uris)
            .bind(client.created_at.to_rfc3339())
            .bind(client.updated_at.to_rfc3339())
            .execute(engine.pool())
            .await
            .map_err(DbError::QueryFailed)?;

        Ok((client, secret))
    }

    /// Finds a client by its ID.
    pub async fn find_by_id(engine: &WorkspaceEngine, id: ClientId) -> Result<Option<Self>, DbError> {
        let query = format!("{SELECT_CLIENT} WHERE id = $1");
        let sql = engine.sql(&query);
        sqlx::query_as::<_, ClientRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(engine.pool())
            .await
            .map_err(DbError::QueryFailed)?
            .map(Self::try_from)
            .transpose()
    }

    /// Lists clients in creation order.
    pub async fn list(engine: &WorkspaceEngine) -> Result<Vec<Self>, DbError> {
        let sql = format!("{SELECT_CLIENT} ORDER BY created_at ASC");
        sqlx::query_as::<_, ClientRow>(&sql)
            .fetch_all(engine.pool())
            .await
            .map_err(DbError::QueryFailed)?
            .into_iter()
            .map(Self::try_from)
            .collect()
    }

    /// Deletes a client. Returns the deleted record, if there was one.
    pub async fn delete(engine: &WorkspaceEngine, id: ClientId) -> Result<Option<Self>, DbError> {
        let Some(existing) = Self::find_by_id(engine, id).await? else {
            return Ok(None);
        };

        let sql = engine.sql("DELETE FROM warden_clients WHERE id = $1");
        sqlx::query(&sql)
            .bind(id.to_string())
            .execute(engine.pool())
            .await
            .map_err(DbError::QueryFailed)?;

        Ok(Some(existing))
    }
}
