//! Database models.
//!
//! [`Workspace`] lives in the platform database. [`Client`] and
//! [`LinkedAccount`] live in each workspace's own database and are reached
//! through a [`WorkspaceEngine`], so they only use types every dialect
//! understands (ids and timestamps are stored as text).

pub mod client;
pub mod linked_account;
pub mod workspace;

pub use client::{Client, ClientType, CreateClient};
pub use linked_account::{
    CreateLinkedAccount, LinkedAccount, LinkedAccountColumns, ACCOUNT_FIELD_MAX_LEN,
};
pub use workspace::{
    ConnectionSettings, CreateWorkspace, IsolatedDatabase, UpdateWorkspace, Workspace,
    WorkspaceRow,
};

use chrono::{DateTime, Utc};

use crate::dialect::DatabaseType;
use crate::engine::WorkspaceEngine;
use crate::error::DbError;

pub(crate) fn parse_id<T: std::str::FromStr>(raw: &str) -> Result<T, DbError>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| DbError::ValidationFailed(e.to_string()))
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DbError::ValidationFailed(format!("invalid timestamp {raw:?}: {e}")))
}

/// Create the tenant tables in a workspace database if they are missing.
///
/// This is a bootstrap for fresh workspaces, not a migration runner: it
/// never alters an existing table.
pub async fn ensure_workspace_tables(
    engine: &WorkspaceEngine,
    columns: LinkedAccountColumns,
) -> Result<(), DbError> {
    if engine.dialect() == DatabaseType::Postgres {
        let create_schema = format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", engine.scope().schema);
        sqlx::query(&create_schema)
            .execute(engine.pool())
            .await
            .map_err(DbError::QueryFailed)?;
    }

    for statement in table_statements(columns) {
        sqlx::query(&statement)
            .execute(engine.pool())
            .await
            .map_err(DbError::QueryFailed)?;
    }
    Ok(())
}

fn table_statements(columns: LinkedAccountColumns) -> [String; 2] {
    let email_null = if columns.account_email_nullable {
        "NULL"
    } else {
        "NOT NULL"
    };
    [
        r#"
        CREATE TABLE IF NOT EXISTS warden_clients (
            id VARCHAR(36) PRIMARY KEY,
            workspace_id VARCHAR(36) NOT NULL,
            name VARCHAR(255) NOT NULL,
            client_id VARCHAR(255) NOT NULL UNIQUE,
            client_secret TEXT NULL,
            client_type VARCHAR(32) NOT NULL,
            redirect_uris TEXT NOT NULL,
            created_at VARCHAR(64) NOT NULL,
            updated_at VARCHAR(64) NOT NULL
        )
        "#
        .to_string(),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS warden_linked_accounts (
                id VARCHAR(36) PRIMARY KEY,
                user_id VARCHAR(36) NOT NULL,
                provider VARCHAR(255) NOT NULL,
                account_id VARCHAR({max}) NOT NULL,
                account_email VARCHAR({max}) {email_null},
                access_token TEXT NOT NULL,
                refresh_token TEXT NULL,
                expires_at VARCHAR(64) NULL,
                created_at VARCHAR(64) NOT NULL,
                updated_at VARCHAR(64) NOT NULL
            )
            "#,
            max = ACCOUNT_FIELD_MAX_LEN,
        ),
    ]
}
