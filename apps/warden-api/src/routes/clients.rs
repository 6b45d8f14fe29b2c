//! OAuth clients stored in the routed workspace's own database.
//!
//! Creating and deleting a client fires `object.created` and
//! `object.deleted` webhooks. The write is never rolled back because an
//! event could not be queued.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use warden_core::{ClientId, WardenError, WorkspaceId};
use warden_db::models::{Client, ClientType, CreateClient};
use warden_db::WorkspaceEngine;
use warden_webhooks::{ClientSchema, WebhookEventType};

use crate::error::ApiResult;
use crate::middleware::WorkspaceContext;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ClientResponse {
    pub id: ClientId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub client_id: String,
    pub client_type: ClientType,
    pub redirect_uris: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Client> for ClientResponse {
    fn from(c: Client) -> Self {
        Self {
            id: c.id,
            workspace_id: c.workspace_id,
            name: c.name,
            client_id: c.client_id,
            client_type: c.client_type,
            redirect_uris: c.redirect_uris,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Returned once, on creation. Confidential clients get their secret here
/// and never again.
#[derive(Debug, Serialize)]
pub struct CreatedClientResponse {
    #[serde(flatten)]
    pub client: ClientResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

/// The routed engine. Its tenant tables were created when it was opened.
async fn workspace_engine(state: &AppState, ctx: WorkspaceContext) -> ApiResult<WorkspaceEngine> {
    Ok(state.router.engine(ctx.workspace_id).await?)
}

fn client_not_found(id: ClientId) -> WardenError {
    WardenError::NotFound {
        resource: "Client".to_string(),
        id: Some(id.to_string()),
    }
}

/// Queue webhooks for `client`; failures are logged only.
async fn notify(state: &AppState, event_type: WebhookEventType, client: &Client) {
    if let Err(e) = state
        .trigger
        .trigger::<ClientSchema>(event_type, client, client.workspace_id)
        .await
    {
        tracing::warn!(
            target: "webhook_delivery",
            workspace_id = %client.workspace_id,
            event_type = %event_type,
            error = %e,
            "Failed to queue client webhooks"
        );
    }
}

pub async fn create_client(
    State(state): State<AppState>,
    Extension(ctx): Extension<WorkspaceContext>,
    Json(input): Json<CreateClient>,
) -> ApiResult<(StatusCode, Json<CreatedClientResponse>)> {
    let engine = workspace_engine(&state, ctx).await?;
    let (client, client_secret) = Client::create(&engine, &state.codec, input).await?;

    notify(&state, WebhookEventType::ObjectCreated, &client).await;

    Ok((
        StatusCode::CREATED,
        Json(CreatedClientResponse {
            client: client.into(),
            client_secret,
        }),
    ))
}

pub async fn list_clients(
    State(state): State<AppState>,
    Extension(ctx): Extension<WorkspaceContext>,
) -> ApiResult<Json<Vec<ClientResponse>>> {
    let engine = workspace_engine(&state, ctx).await?;
    let clients = Client::list(&engine).await?;
    Ok(Json(clients.into_iter().map(Into::into).collect()))
}

pub async fn get_client(
    State(state): State<AppState>,
    Extension(ctx): Extension<WorkspaceContext>,
    Path(id): Path<ClientId>,
) -> ApiResult<Json<ClientResponse>> {
    let engine = workspace_engine(&state, ctx).await?;
    let client = Client::find_by_id(&engine, id)
        .await?
        .ok_or_else(|| client_not_found(id))?;
    Ok(Json(client.into()))
}

pub async fn delete_client(
    State(state): State<AppState>,
    Extension(ctx): Extension<WorkspaceContext>,
    Path(id): Path<ClientId>,
) -> ApiResult<StatusCode> {
    let engine = workspace_engine(&state, ctx).await?;
    let client = Client::delete(&engine, id)
        .await?
        .ok_or_else(|| client_not_found(id))?;

    notify(&state, WebhookEventType::ObjectDeleted, &client).await;
    Ok(StatusCode::NO_CONTENT)
}
