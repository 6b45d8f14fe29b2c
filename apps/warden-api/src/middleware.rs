//! Workspace resolution for workspace-scoped routes.
//!
//! A request names its workspace with the `X-Workspace-ID` header, by
//! arriving on a host that is some workspace's domain, or both. When both
//! are present they must agree; a disagreement is refused rather than
//! resolved in favor of either side. Archived and unknown workspaces are
//! never routed.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use warden_core::{WardenError, WorkspaceId};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const WORKSPACE_HEADER: &str = "X-Workspace-ID";

/// The workspace a request was routed to. Inserted as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceContext {
    pub workspace_id: WorkspaceId,
}

/// Read the workspace id from the header.
///
/// Missing or empty values give `Ok(None)`; anything unparsable is an error.
pub fn workspace_from_header(headers: &HeaderMap) -> ApiResult<Option<WorkspaceId>> {
    let Some(value) = headers.get(WORKSPACE_HEADER) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| ApiError::InvalidHeader {
        header: WORKSPACE_HEADER,
        message: "not valid ASCII".to_string(),
    })?;
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|e: warden_core::ParseIdError| {
        ApiError::InvalidHeader {
            header: WORKSPACE_HEADER,
            message: e.to_string(),
        }
    })
}

/// Host of the request without its port.
pub fn request_host(headers: &HeaderMap) -> Option<&str> {
    let host = headers.get(header::HOST)?.to_str().ok()?.trim();
    let host = match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    };
    (!host.is_empty()).then_some(host)
}

pub async fn resolve_workspace(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let from_header = workspace_from_header(request.headers())?;
    let from_host = match request_host(request.headers()) {
        Some(host) => state.registry.get_by_domain(host).await?.map(|w| w.id),
        None => None,
    };

    let workspace_id = match (from_header, from_host) {
        (Some(expected), Some(actual)) if expected != actual => {
            tracing::warn!(
                target: "workspace_router",
                header_workspace = %expected,
                host_workspace = %actual,
                "Workspace header does not match request host"
            );
            return Err(WardenError::WorkspaceMismatch { expected, actual }.into());
        }
        (Some(id), _) | (None, Some(id)) => id,
        (None, None) => return Err(ApiError::MissingWorkspace(WORKSPACE_HEADER)),
    };

    // The header alone is not proof the workspace is live
    if from_host.is_none() {
        let workspace = state.registry.get(workspace_id).await?;
        if workspace.is_archived() {
            return Err(WardenError::NotFound {
                resource: "Workspace".to_string(),
                id: Some(workspace_id.to_string()),
            }
            .into());
        }
    }

    request
        .extensions_mut()
        .insert(WorkspaceContext { workspace_id });
    Ok(next.run(request).await)
}
