//! HTTP error mapping for the API.
//!
//! Every failure becomes a JSON `{error, message, status}` body. Server-side
//! failures are logged and answered with a generic message so connection
//! details and crypto errors never reach the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use warden_core::WardenError;
use warden_db::{DbError, RegistryError, RouterError};
use warden_webhooks::WebhookError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error(transparent)]
    Warden(#[from] WardenError),

    /// Neither the workspace header nor the host named a workspace.
    #[error("No workspace: send the {0} header or use a workspace domain")]
    MissingWorkspace(&'static str),

    #[error("Invalid {header} header: {message}")]
    InvalidHeader {
        header: &'static str,
        message: String,
    },
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
}

fn db_status(e: &DbError) -> (StatusCode, &'static str) {
    match e {
        DbError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        DbError::ValidationFailed(_) | DbError::InvalidUrl(_) | DbError::UnknownDatabaseType(_) => {
            (StatusCode::BAD_REQUEST, "validation_error")
        }
        DbError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        DbError::Crypto(_) => (StatusCode::INTERNAL_SERVER_ERROR, "decryption_error"),
        DbError::QueryFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
    }
}

fn registry_status(e: &RegistryError) -> (StatusCode, &'static str) {
    match e {
        RegistryError::NotFound(_) => (StatusCode::NOT_FOUND, "workspace_not_found"),
        RegistryError::IncompleteConnection(_) | RegistryError::Invalid(_) => {
            (StatusCode::BAD_REQUEST, "validation_error")
        }
        RegistryError::DomainTaken(_) => (StatusCode::CONFLICT, "domain_taken"),
        RegistryError::Crypto { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "decryption_error"),
        RegistryError::Store(e) => db_status(e),
        RegistryError::Connection(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "workspace_unavailable")
        }
    }
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Registry(e) => registry_status(e),
            ApiError::Router(RouterError::Registry(e)) => registry_status(e),
            ApiError::Router(RouterError::Connection(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "workspace_unavailable")
            }
            ApiError::Db(e) => db_status(e),
            // Rendered by WebhookError itself
            ApiError::Webhook(_) => (StatusCode::INTERNAL_SERVER_ERROR, "webhook_error"),
            ApiError::Warden(e) => {
                let kind = match e {
                    WardenError::NotFound { .. } => "not_found",
                    WardenError::WorkspaceMismatch { .. } => "workspace_mismatch",
                    WardenError::ValidationError { .. } => "validation_error",
                };
                (
                    StatusCode::from_u16(e.status_code())
                        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                    kind,
                )
            }
            ApiError::MissingWorkspace(_) => (StatusCode::BAD_REQUEST, "missing_workspace"),
            ApiError::InvalidHeader { .. } => (StatusCode::BAD_REQUEST, "invalid_header"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Webhook(e) = self {
            return e.into_response();
        }

        let (status, error_type) = self.status_and_kind();

        let message = if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
            match status {
                StatusCode::SERVICE_UNAVAILABLE => {
                    "Workspace database is temporarily unavailable".to_string()
                }
                _ => "An internal error occurred".to_string(),
            }
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            status: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}
