use axum::extract::State;
use axum::{Extension, Json};
use serde::Serialize;
use warden_core::WorkspaceId;
use warden_db::DatabaseType;

use crate::error::ApiResult;
use crate::middleware::WorkspaceContext;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub workspace_id: WorkspaceId,
    pub dialect: DatabaseType,
    pub shared_database: bool,
}

/// Open (or reuse) the workspace engine and run a trivial query on it.
pub async fn ping(
    State(state): State<AppState>,
    Extension(ctx): Extension<WorkspaceContext>,
) -> ApiResult<Json<PingResponse>> {
    let engine = state.router.engine(ctx.workspace_id).await?;
    engine.ping().await?;
    Ok(Json(PingResponse {
        workspace_id: engine.workspace_id(),
        dialect: engine.dialect(),
        shared_database: engine.scope().shared,
    }))
}
