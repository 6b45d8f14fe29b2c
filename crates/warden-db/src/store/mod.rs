//! Persistence of workspace records.
//!
//! The registry only talks to the [`WorkspaceStore`] trait. The Postgres
//! backend is used in production; the in-memory one backs tests and local
//! development.

use async_trait::async_trait;
use warden_core::WorkspaceId;

use crate::error::DbError;
use crate::models::Workspace;

pub mod memory;
pub mod postgres;

pub use memory::MemoryWorkspaceStore;
pub use postgres::PgWorkspaceStore;

#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    /// Insert a new workspace. Fails with [`DbError::Conflict`] when another
    /// active workspace already owns the domain.
    async fn insert(&self, workspace: Workspace) -> Result<Workspace, DbError>;

    /// Replace a stored workspace. Fails with [`DbError::NotFound`] when the
    /// id is unknown.
    async fn update(&self, workspace: Workspace) -> Result<Workspace, DbError>;

    /// Find a workspace by id, archived or not.
    async fn find_by_id(&self, id: WorkspaceId) -> Result<Option<Workspace>, DbError>;

    /// Find the active workspace routed on `domain`.
    async fn find_by_domain(&self, domain: &str) -> Result<Option<Workspace>, DbError>;

    /// Active workspaces in creation order.
    async fn list(&self) -> Result<Vec<Workspace>, DbError>;

    fn backend_name(&self) -> &'static str;
}
