//! A live, schema-scoped handle to one workspace's database.

use std::borrow::Cow;

use sqlx::AnyPool;
use warden_core::WorkspaceId;

use crate::dialect::DatabaseType;
use crate::error::DbError;

/// Where a workspace's data lives inside the database it connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionScope {
    pub workspace_id: WorkspaceId,
    /// Schema name, the canonical workspace id.
    pub schema: String,
    /// Connected to the platform's shared default database.
    pub shared: bool,
}

impl ConnectionScope {
    /// Statement run on every fresh connection, if the dialect needs one.
    #[must_use]
    pub fn statement(&self, dialect: DatabaseType) -> Option<String> {
        dialect.scope_statement(&self.schema, self.shared)
    }
}

/// Connection pool of one workspace.
///
/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct WorkspaceEngine {
    scope: ConnectionScope,
    dialect: DatabaseType,
    pool: AnyPool,
}

impl WorkspaceEngine {
    #[must_use]
    pub fn new(scope: ConnectionScope, dialect: DatabaseType, pool: AnyPool) -> Self {
        Self {
            scope,
            dialect,
            pool,
        }
    }

    #[must_use]
    pub fn workspace_id(&self) -> WorkspaceId {
        self.scope.workspace_id
    }

    #[must_use]
    pub fn scope(&self) -> &ConnectionScope {
        &self.scope
    }

    #[must_use]
    pub fn dialect(&self) -> DatabaseType {
        self.dialect
    }

    #[must_use]
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Rewrite `$N` placeholders for this engine's dialect.
    #[must_use]
    pub fn sql<'a>(&self, query: &'a str) -> Cow<'a, str> {
        self.dialect.placeholders(query)
    }

    /// Round trip to the database.
    pub async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DbError::QueryFailed)?;
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
