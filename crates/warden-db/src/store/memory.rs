//! In-memory workspace store.
//!
//! Not durable: all state is lost on restart. Records are kept in insertion
//! order behind a `tokio::sync::RwLock`, which is plenty for tests and
//! development workloads.

use async_trait::async_trait;
use tokio::sync::RwLock;
use warden_core::WorkspaceId;

use super::WorkspaceStore;
use crate::error::DbError;
use crate::models::Workspace;

#[derive(Debug, Default)]
pub struct MemoryWorkspaceStore {
    workspaces: RwLock<Vec<Workspace>>,
}

impl MemoryWorkspaceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn domain_taken(workspaces: &[Workspace], domain: &str, except: WorkspaceId) -> bool {
    workspaces
        .iter()
        .any(|w| w.id != except && !w.is_archived() && w.domain.eq_ignore_ascii_case(domain))
}

#[async_trait]
impl WorkspaceStore for MemoryWorkspaceStore {
    async fn insert(&self, workspace: Workspace) -> Result<Workspace, DbError> {
        let mut guard = self.workspaces.write().await;
        if guard.iter().any(|w| w.id == workspace.id) {
            return Err(DbError::Conflict(format!("workspace {} exists", workspace.id)));
        }
        if domain_taken(&guard, &workspace.domain, workspace.id) {
            return Err(DbError::Conflict(format!("domain {} in use", workspace.domain)));
        }
        guard.push(workspace.clone());
        Ok(workspace)
    }

    async fn update(&self, workspace: Workspace) -> Result<Workspace, DbError> {
        let mut guard = self.workspaces.write().await;
        if !workspace.is_archived() && domain_taken(&guard, &workspace.domain, workspace.id) {
            return Err(DbError::Conflict(format!("domain {} in use", workspace.domain)));
        }
        let slot = guard
            .iter_mut()
            .find(|w| w.id == workspace.id)
            .ok_or_else(|| DbError::NotFound(format!("workspace {}", workspace.id)))?;
        *slot = workspace.clone();
        Ok(workspace)
    }

    async fn find_by_id(&self, id: WorkspaceId) -> Result<Option<Workspace>, DbError> {
        let guard = self.workspaces.read().await;
        Ok(guard.iter().find(|w| w.id == id).cloned())
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Option<Workspace>, DbError> {
        let guard = self.workspaces.read().await;
        Ok(guard
            .iter()
            .find(|w| !w.is_archived() && w.domain.eq_ignore_ascii_case(domain))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Workspace>, DbError> {
        let guard = self.workspaces.read().await;
        Ok(guard.iter().filter(|w| !w.is_archived()).cloned().collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
