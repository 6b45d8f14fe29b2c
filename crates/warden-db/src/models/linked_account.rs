//! OAuth accounts linked to users of a workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use warden_core::WardenError;
use warden_crypto::{EncryptedField, SecretCodec};

use crate::engine::WorkspaceEngine;
use crate::error::DbError;

use super::{parse_id, parse_timestamp};

/// Maximum length, in characters, of `account_id` and `account_email`.
///
/// Fits a MySQL index on a utf8mb4 column.
pub const ACCOUNT_FIELD_MAX_LEN: usize = 512;

/// Column constraints of the linked account table.
///
/// `account_id` is always required. Whether `account_email` may be null is a
/// deployment choice, since some providers never disclose an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedAccountColumns {
    pub account_email_nullable: bool,
}

impl Default for LinkedAccountColumns {
    fn default() -> Self {
        Self {
            account_email_nullable: true,
        }
    }
}

/// An account at an external identity provider linked to a local user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    /// The user's id at the provider.
    pub account_id: String,
    pub account_email: Option<String>,
    pub access_token: EncryptedField<String>,
    pub refresh_token: Option<EncryptedField<String>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for linking an account. Tokens are plaintext here.
#[derive(Clone)]
pub struct CreateLinkedAccount {
    pub user_id: Uuid,
    pub provider: String,
    pub account_id: String,
    pub account_email: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for CreateLinkedAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateLinkedAccount")
            .field("user_id", &self.user_id)
            .field("provider", &self.provider)
            .field("account_id", &self.account_id)
            .field("account_email", &self.account_email)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn check_len(field: &str, value: &str) -> Result<(), WardenError> {
    let len = value.chars().count();
    if len > ACCOUNT_FIELD_MAX_LEN {
        return Err(WardenError::validation(
            field,
            format!("must be at most {ACCOUNT_FIELD_MAX_LEN} characters, got {len}"),
        ));
    }
    Ok(())
}

impl CreateLinkedAccount {
    /// Check the input against the column constraints.
    ///
    /// Over-long values are rejected, never truncated.
    pub fn validate(&self, columns: LinkedAccountColumns) -> Result<(), WardenError> {
        if self.account_id.is_empty() {
            return Err(WardenError::validation("account_id", "must not be empty"));
        }
        check_len("account_id", &self.account_id)?;

        match &self.account_email {
            Some(email) => check_len("account_email", email)?,
            None if !columns.account_email_nullable => {
                return Err(WardenError::validation("account_email", "is required"));
            }
            None => {}
        }

        if self.provider.trim().is_empty() {
            return Err(WardenError::validation("provider", "must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct LinkedAccountRow {
    id: String,
    user_id: String,
    provider: String,
    account_id: String,
    account_email: Option<String>,
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<LinkedAccountRow> for LinkedAccount {
    type Error = DbError;

    fn try_from(row: LinkedAccountRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id(&row.id)?,
            user_id: parse_id(&row.user_id)?,
            provider: row.provider,
            account_id: row.account_id,
            account_email: row.account_email,
            access_token: EncryptedField::from_ciphertext(row.access_token),
            refresh_token: row.refresh_token.map(EncryptedField::from_ciphertext),
            expires_at: row.expires_at.as_deref().map(parse_timestamp).transpose()?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

const SELECT_LINKED_ACCOUNT: &str = r#"
    SELECT id, user_id, provider, account_id, account_email, access_token, refresh_token,
           expires_at, created_at, updated_at
    FROM warden_linked_accounts
"#;

impl LinkedAccount {
    /// Link an account after validating it against `columns`.
    pub async fn create(
        engine: &WorkspaceEngine,
        codec: &SecretCodec,
        columns: LinkedAccountColumns,
        input: CreateLinkedAccount,
    ) -> Result<Self, DbError> {
        input
            .validate(columns)
            .map_err(|e| DbError::ValidationFailed(e.to_string()))?;

        let now = Utc::now();
        let account = Self {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            provider: input.provider,
            account_id: input.account_id,
            account_email: input.account_email,
            access_token: EncryptedField::seal(&input.access_token, codec)?,
            refresh_token: input
                .refresh_token
                .as_ref()
                .map(|t| EncryptedField::seal(t, codec))
                .transpose()?,
            expires_at: input.expires_at,
            created_at: now,
            updated_at: now,
        };

        let sql = engine.sql(
            r#"
            INSERT INTO warden_linked_accounts (
                id, user_id, provider, account_id, account_email, access_token, refresh_token,
                expires_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        );
        sqlx::query(&sql)
            .bind(account.id.to_string())
            .bind(account.user_id.to_string())
            .bind(account.provider.clone())
            .bind(account.account_id.clone())
            .bind(account.account_email.clone())
            .bind(account.access_token.ciphertext().to_string())
            .bind(account.refresh_token.as_ref().map(|t| t.ciphertext().to_string()))
            .bind(account.expires_at.map(|t| t.to_rfc3339()))
            .bind(account.created_at.to_rfc3339())
            .bind(account.updated_at.to_rfc3339())
            .execute(engine.pool())
            .await
            .map_err(DbError::QueryFailed)?;

        Ok(account)
    }

    /// Find the local link of a provider account.
    pub async fn find_by_account(
        engine: &WorkspaceEngine,
        provider: &str,
        account_id: &str,
    ) -> Result<Option<Self>, DbError> {
        let query = format!("{SELECT_LINKED_ACCOUNT} WHERE provider = $1 AND account_id = $2");
        let sql = engine.sql(&query);
        sqlx::query_as::<_, LinkedAccountRow>(&sql)
            .bind(provider.to_string())
            .bind(account_id.to_string())
            .fetch_optional(engine.pool())
            .await
            .map_err(DbError::QueryFailed)?
            .map(Self::try_from)
            .transpose()
    }

    /// All accounts linked to a user, oldest first.
    pub async fn find_by_user_id(
        engine: &WorkspaceEngine,
        user_id: Uuid,
    ) -> Result<Vec<Self>, DbError> {
        let query = format!("{SELECT_LINKED_ACCOUNT} WHERE user_id = $1 ORDER BY created_at ASC");
        let sql = engine.sql(&query);
        sqlx::query_as::<_, LinkedAccountRow>(&sql)
            .bind(user_id.to_string())
            .fetch_all(engine.pool())
            .await
            .map_err(DbError::QueryFailed)?
            .into_iter()
            .map(Self::try_from)
            .collect()
    }
}
