//! Error Types
//!
//! Errors that every layer can raise and that map onto a fixed HTTP status.
//!
//! ```
//! use warden_core::{Result, WardenError};
//!
//! fn check_name(name: &str) -> Result<()> {
//!     if name.trim().is_empty() {
//!         return Err(WardenError::ValidationError {
//!             field: "name".to_string(),
//!             message: "must not be empty".to_string(),
//!         });
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_name(" ").is_err());
//! ```

use crate::ids::WorkspaceId;
use serde::Serialize;
use thiserror::Error;

/// Standardized error type for warden.
///
/// - `NotFound` maps to HTTP 404
/// - `WorkspaceMismatch` maps to HTTP 403
/// - `ValidationError` maps to HTTP 400
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WardenError {
    /// Requested resource was not found.
    #[error("{resource} not found{}", id.as_ref().map(|i| format!(": {i}")).unwrap_or_default())]
    NotFound {
        /// The type of resource that was not found (e.g., "Workspace")
        resource: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// A request named one workspace but was routed to another.
    ///
    /// Treated as an isolation violation, never resolved by picking one.
    #[error("Workspace mismatch: expected {expected}, got {actual}")]
    WorkspaceMismatch {
        expected: WorkspaceId,
        actual: WorkspaceId,
    },

    /// Input validation failure.
    #[error("Validation error on field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },
}

impl WardenError {
    /// Shorthand for a validation failure on `field`.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        WardenError::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// HTTP status code this error maps to.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            WardenError::NotFound { .. } => 404,
            WardenError::WorkspaceMismatch { .. } => 403,
            WardenError::ValidationError { .. } => 400,
        }
    }
}

/// Type alias for Results using `WardenError`.
pub type Result<T> = std::result::Result<T, WardenError>;
