//! `sqlx` connector for workspace engines.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::any::AnyPoolOptions;
use sqlx::Executor;

use super::WorkspaceConnector;
use crate::engine::{ConnectionScope, WorkspaceEngine};
use crate::error::DbError;
use crate::models::{ensure_workspace_tables, LinkedAccountColumns};
use crate::url::DatabaseUrl;

/// Opens an [`AnyPool`](sqlx::AnyPool) per workspace.
///
/// Every pooled connection runs the scope statement of the workspace right
/// after connecting, so queries never see another workspace's schema.
/// With [`with_workspace_tables`](Self::with_workspace_tables) the tenant
/// tables are also created once per opened engine. Probes never create them.
#[derive(Debug, Clone)]
pub struct SqlxConnector {
    max_connections: u32,
    acquire_timeout: Duration,
    workspace_tables: Option<LinkedAccountColumns>,
}

impl SqlxConnector {
    #[must_use]
    pub fn new(max_connections: u32, acquire_timeout: Duration) -> Self {
        sqlx::any::install_default_drivers();
        Self {
            max_connections,
            acquire_timeout,
            workspace_tables: None,
        }
    }

    #[must_use]
    pub fn with_workspace_tables(mut self, columns: LinkedAccountColumns) -> Self {
        self.workspace_tables = Some(columns);
        self
    }
}

#[async_trait]
impl WorkspaceConnector for SqlxConnector {
    type Engine = WorkspaceEngine;

    async fn connect(
        &self,
        url: &DatabaseUrl,
        scope: &ConnectionScope,
    ) -> Result<WorkspaceEngine, sqlx::Error> {
        let rendered = url
            .render()
            .map_err(|e| sqlx::Error::Configuration(Box::new(e)))?;
        let statement = scope.statement(url.dialect());

        let pool = AnyPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .after_connect(move |conn, _meta| {
                let statement = statement.clone();
                Box::pin(async move {
                    if let Some(statement) = statement {
                        conn.execute(statement.as_str()).await?;
                    }
                    Ok(())
                })
            })
            .connect(&rendered)
            .await?;

        Ok(WorkspaceEngine::new(scope.clone(), url.dialect(), pool))
    }

    async fn prepare(&self, engine: &WorkspaceEngine) -> Result<(), sqlx::Error> {
        let Some(columns) = self.workspace_tables else {
            return Ok(());
        };
        ensure_workspace_tables(engine, columns)
            .await
            .map_err(|e| match e {
                DbError::QueryFailed(source) => source,
                other => sqlx::Error::Protocol(other.to_string()),
            })
    }

    async fn close(&self, engine: WorkspaceEngine) {
        engine.close().await;
    }
}
