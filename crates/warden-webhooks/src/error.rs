//! Error types for the webhook system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use warden_crypto::CryptoError;
use warden_db::DbError;

/// Webhook system error variants.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Storage error: {0}")]
    Store(#[from] DbError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("SSRF protection: {0}")]
    SsrfDetected(String),

    #[error("Subscription limit ({limit}) reached for workspace")]
    SubscriptionLimitExceeded { limit: usize },

    #[error("Subscription not found")]
    SubscriptionNotFound,

    #[error("Secret encryption failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// JSON error response returned by webhook API endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
}

impl WebhookError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            WebhookError::Store(e) if e.is_not_found() => {
                (StatusCode::NOT_FOUND, "subscription_not_found")
            }
            WebhookError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            WebhookError::InvalidUrl(_) => (StatusCode::BAD_REQUEST, "invalid_url"),
            WebhookError::SsrfDetected(_) => (StatusCode::BAD_REQUEST, "ssrf_detected"),
            WebhookError::SubscriptionLimitExceeded { .. } => {
                (StatusCode::CONFLICT, "subscription_limit_exceeded")
            }
            WebhookError::SubscriptionNotFound => {
                (StatusCode::NOT_FOUND, "subscription_not_found")
            }
            WebhookError::Crypto(_) => (StatusCode::INTERNAL_SERVER_ERROR, "encryption_error"),
            WebhookError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error")
            }
            WebhookError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            WebhookError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_kind();

        // Keep crypto and storage details out of responses
        let message = if status.is_server_error() {
            tracing::error!(target: "webhook_delivery", error = %self, "Webhook request failed");
            "An internal error occurred".to_string()
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

pub type ApiResult<T> = Result<T, WebhookError>;

/// Why a single delivery attempt failed. Internal to the worker.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("Request timeout")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Subscription secret unreadable: {0}")]
    Secret(CryptoError),
}

impl DeliveryError {
    /// Timeouts, connection failures, 5xx and 429 are worth another attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            DeliveryError::Status(code) => *code == 429 || (500..600).contains(code),
            DeliveryError::Timeout | DeliveryError::Connect(_) => true,
            DeliveryError::Request(_) | DeliveryError::Secret(_) => false,
        }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DeliveryError::Timeout
        } else if e.is_connect() {
            DeliveryError::Connect(e.to_string())
        } else {
            DeliveryError::Request(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(DeliveryError::Status(500).is_retryable());
        assert!(DeliveryError::Status(503).is_retryable());
        assert!(DeliveryError::Status(429).is_retryable());
        assert!(DeliveryError::Timeout.is_retryable());
        assert!(DeliveryError::Connect("refused".into()).is_retryable());
    }

    #[test]
    fn test_permanent_failures() {
        assert!(!DeliveryError::Status(400).is_retryable());
        assert!(!DeliveryError::Status(404).is_retryable());
        assert!(!DeliveryError::Status(410).is_retryable());
        assert!(!DeliveryError::Secret(CryptoError::Decryption("tag mismatch".into())).is_retryable());
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (WebhookError::InvalidUrl("x".into()), StatusCode::BAD_REQUEST),
            (WebhookError::SsrfDetected("x".into()), StatusCode::BAD_REQUEST),
            (
                WebhookError::SubscriptionLimitExceeded { limit: 25 },
                StatusCode::CONFLICT,
            ),
            (WebhookError::SubscriptionNotFound, StatusCode::NOT_FOUND),
            (
                WebhookError::Store(DbError::NotFound("subscription".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                WebhookError::Crypto(CryptoError::Decryption("tag mismatch".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
