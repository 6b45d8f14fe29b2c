//! CRUD handlers for webhook subscriptions of the routed workspace.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use warden_core::SubscriptionId;
use warden_webhooks::models::{
    CreateSubscriptionRequest, CreatedSubscriptionResponse, EventTypeListResponse,
    SubscriptionResponse, UpdateSubscriptionRequest,
};
use warden_webhooks::FailedDelivery;

use crate::error::ApiResult;
use crate::middleware::WorkspaceContext;
use crate::state::AppState;

/// Create a subscription. The signing secret is only ever returned here.
pub async fn create_subscription(
    State(state): State<AppState>,
    Extension(ctx): Extension<WorkspaceContext>,
    Json(request): Json<CreateSubscriptionRequest>,
) -> ApiResult<(StatusCode, Json<CreatedSubscriptionResponse>)> {
    let created = state
        .subscriptions
        .create(ctx.workspace_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_subscriptions(
    State(state): State<AppState>,
    Extension(ctx): Extension<WorkspaceContext>,
) -> ApiResult<Json<Vec<SubscriptionResponse>>> {
    Ok(Json(state.subscriptions.list(ctx.workspace_id).await?))
}

pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(ctx): Extension<WorkspaceContext>,
    Path(id): Path<SubscriptionId>,
) -> ApiResult<Json<SubscriptionResponse>> {
    Ok(Json(state.subscriptions.get(ctx.workspace_id, id).await?))
}

pub async fn update_subscription(
    State(state): State<AppState>,
    Extension(ctx): Extension<WorkspaceContext>,
    Path(id): Path<SubscriptionId>,
    Json(request): Json<UpdateSubscriptionRequest>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let updated = state
        .subscriptions
        .update(ctx.workspace_id, id, request)
        .await?;
    Ok(Json(updated))
}

pub async fn delete_subscription(
    State(state): State<AppState>,
    Extension(ctx): Extension<WorkspaceContext>,
    Path(id): Path<SubscriptionId>,
) -> ApiResult<StatusCode> {
    state.subscriptions.delete(ctx.workspace_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_event_types() -> Json<EventTypeListResponse> {
    Json(EventTypeListResponse::all())
}

/// Deliveries of this workspace the worker gave up on, oldest first.
pub async fn list_failures(
    State(state): State<AppState>,
    Extension(ctx): Extension<WorkspaceContext>,
) -> Json<Vec<FailedDelivery>> {
    let failures = state
        .failures
        .entries()
        .await
        .into_iter()
        .filter(|f| f.workspace_id == ctx.workspace_id)
        .collect();
    Json(failures)
}
