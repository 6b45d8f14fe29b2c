//! Workspace administration.
//!
//! Connection credentials are accepted on create and update but never
//! returned; responses only say which kind of database a workspace uses.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use warden_core::WorkspaceId;
use warden_db::models::{CreateWorkspace, UpdateWorkspace, Workspace};
use warden_db::DatabaseType;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WorkspaceResponse {
    pub id: WorkspaceId,
    pub name: String,
    pub domain: String,
    /// `None` for workspaces on the shared database.
    pub database_type: Option<DatabaseType>,
    pub shared_database: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

impl From<Workspace> for WorkspaceResponse {
    fn from(w: Workspace) -> Self {
        Self {
            id: w.id,
            database_type: w.database_type(),
            shared_database: w.uses_shared_database(),
            name: w.name,
            domain: w.domain,
            created_at: w.created_at,
            updated_at: w.updated_at,
            archived_at: w.archived_at,
        }
    }
}

pub async fn create_workspace(
    State(state): State<AppState>,
    Json(input): Json<CreateWorkspace>,
) -> ApiResult<(StatusCode, Json<WorkspaceResponse>)> {
    let workspace = state.registry.create(input).await?;
    Ok((StatusCode::CREATED, Json(workspace.into())))
}

pub async fn list_workspaces(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<WorkspaceResponse>>> {
    let workspaces = state.registry.list().await?;
    Ok(Json(workspaces.into_iter().map(Into::into).collect()))
}

pub async fn get_workspace(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
) -> ApiResult<Json<WorkspaceResponse>> {
    let workspace = state.registry.get(id).await?;
    Ok(Json(workspace.into()))
}

/// Partial update. A connection change is probed before it is stored, and
/// the router drops the old engine once the registry announces it.
pub async fn update_workspace(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
    Json(patch): Json<UpdateWorkspace>,
) -> ApiResult<Json<WorkspaceResponse>> {
    let workspace = state.registry.update(id, patch).await?;
    Ok(Json(workspace.into()))
}

/// Soft delete.
pub async fn archive_workspace(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
) -> ApiResult<Json<WorkspaceResponse>> {
    let workspace = state.registry.archive(id).await?;
    Ok(Json(workspace.into()))
}
