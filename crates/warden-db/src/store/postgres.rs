//! Postgres-backed workspace store.
//!
//! Workspaces live in the platform database, never in a tenant database.
//! Encrypted connection fields are stored as the ciphertext strings produced
//! by the codec; this module never sees plaintext.

use async_trait::async_trait;
use sqlx::PgPool;
use warden_core::WorkspaceId;

use super::WorkspaceStore;
use crate::error::DbError;
use crate::models::{Workspace, WorkspaceRow};

const SELECT_WORKSPACE: &str = r#"
    SELECT id, name, domain, database_type, database_host, database_port, database_username,
           database_password, database_name, created_at, updated_at, archived_at
    FROM warden_workspaces
"#;

#[derive(Debug, Clone)]
pub struct PgWorkspaceStore {
    pool: PgPool,
}

impl PgWorkspaceStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the workspace table and its indexes if they are missing.
    pub async fn ensure_schema(&self) -> Result<(), DbError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS warden_workspaces (
                id UUID PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                domain VARCHAR(255) NOT NULL,
                database_type VARCHAR(16),
                database_host TEXT,
                database_port TEXT,
                database_username TEXT,
                database_password TEXT,
                database_name TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                archived_at TIMESTAMPTZ
            )
            "#,
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS warden_workspaces_active_domain
            ON warden_workspaces (lower(domain))
            WHERE archived_at IS NULL
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
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|code| code == "23505").unwrap_or(false);
    }
    false
}

fn write_error(err: sqlx::Error, workspace: &Workspace) -> DbError {
    if is_unique_violation(&err) {
        DbError::Conflict(format!("domain {} in use", workspace.domain))
    } else {
        DbError::QueryFailed(err)
    }
}

#[async_trait]
impl WorkspaceStore for PgWorkspaceStore {
    async fn insert(&self, workspace: Workspace) -> Result<Workspace, DbError> {
        let row = WorkspaceRow::from(&workspace);
        sqlx::query(
            r#"
            INSERT INTO warden_workspaces (
                id, name, domain, database_type, database_host, database_port, database_username,
                database_password, database_name, created_at, updated_at, archived_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(row.id)
        .bind(&row.name)
        .bind(&row.domain)
        .bind(&row.database_type)
        .bind(&row.database_host)
        .bind(&row.database_port)
        .bind(&row.database_username)
        .bind(&row.database_password)
        .bind(&row.database_name)
        .bind(row.created_at)
        .bind(row.updated_at)
        .bind(row.archived_at)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, &workspace))?;

        Ok(workspace)
    }

    async fn update(&self, workspace: Workspace) -> Result<Workspace, DbError> {
        let row = WorkspaceRow::from(&workspace);
        let result = sqlx::query(
            r#"
            UPDATE warden_workspaces
            SET name = $2, domain = $3, database_type = $4, database_host = $5,
                database_port = $6, database_username = $7, database_password = $8,
                database_name = $9, updated_at = $10, archived_at = $11
            WHERE id = $1
            "#,
        )
        .bind(row.id)
        .bind(&row.name)
        .bind(&row.domain)
        .bind(&row.database_type)
        .bind(&row.database_host)
        .bind(&row.database_port)
        .bind(&row.database_username)
        .bind(&row.database_password)
        .bind(&row.database_name)
        .bind(row.updated_at)
        .bind(row.archived_at)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, &workspace))?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("workspace {}", workspace.id)));
        }
        Ok(workspace)
    }

    async fn find_by_id(&self, id: WorkspaceId) -> Result<Option<Workspace>, DbError> {
        let query = format!("{SELECT_WORKSPACE} WHERE id = $1");
        sqlx::query_as::<_, WorkspaceRow>(&query)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::QueryFailed)?
            .map(Workspace::try_from)
            .transpose()
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Option<Workspace>, DbError> {
        let query = format!(
            "{SELECT_WORKSPACE} WHERE lower(domain) = lower($1) AND archived_at IS NULL"
        );
        sqlx::query_as::<_, WorkspaceRow>(&query)
            .bind(domain)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::QueryFailed)?
            .map(Workspace::try_from)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<Workspace>, DbError> {
        let query = format!("{SELECT_WORKSPACE} WHERE archived_at IS NULL ORDER BY created_at ASC, id ASC");
        sqlx::query_as::<_, WorkspaceRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::QueryFailed)?
            .into_iter()
            .map(Workspace::try_from)
            .collect()
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
