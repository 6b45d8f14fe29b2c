//! Error types for the warden-db crate.
//!
//! `DbError` wraps `sqlx` failures of the platform store and tenant models.
//! The registry and the router have their own enums because their callers
//! need to tell a missing workspace apart from an unreachable one.

use thiserror::Error;
use warden_core::WorkspaceId;
use warden_crypto::CryptoError;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A database query failed to execute.
    #[error("Query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation failed.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A connection string could not be parsed or rendered.
    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    /// The database type is not one of the supported dialects.
    #[error("Unknown database type: {0}")]
    UnknownDatabaseType(String),

    /// A sealed column could not be encrypted or opened.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl DbError {
    /// Check if this error indicates a query problem.
    #[must_use]
    pub fn is_query_error(&self) -> bool {
        matches!(self, DbError::QueryFailed(_))
    }

    /// Check if this error indicates a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound(_))
    }

    /// Check if this error indicates a uniqueness conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict(_))
    }

    /// Check if this error indicates a validation error.
    #[must_use]
    pub fn is_validation_failed(&self) -> bool {
        matches!(self, DbError::ValidationFailed(_))
    }
}

/// A workspace database could not be reached.
///
/// Always carries the workspace id. The failed attempt is not cached, so the
/// same call may succeed later.
#[derive(Debug, Clone, Error)]
#[error("Connection to workspace {workspace_id} database failed: {reason}")]
pub struct WorkspaceConnectionError {
    pub workspace_id: WorkspaceId,
    pub reason: String,
}

/// Errors from the workspace registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Workspace not found: {0}")]
    NotFound(WorkspaceId),

    /// A database type was set without all five connection fields.
    #[error("Incomplete database connection: missing {0}")]
    IncompleteConnection(&'static str),

    /// Another workspace already routes this domain.
    #[error("Domain already in use: {0}")]
    DomainTaken(String),

    #[error("Invalid workspace: {0}")]
    Invalid(String),

    /// Stored connection fields could not be decrypted or parsed.
    #[error("Workspace {workspace_id} has unreadable connection settings: {source}")]
    Crypto {
        workspace_id: WorkspaceId,
        #[source]
        source: CryptoError,
    },

    #[error(transparent)]
    Store(#[from] DbError),

    #[error(transparent)]
    Connection(#[from] WorkspaceConnectionError),
}

impl RegistryError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }

    /// Whether retrying the same call later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::Connection(_))
    }
}

/// Errors from the database router.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Connection(#[from] WorkspaceConnectionError),
}

impl RouterError {
    /// The workspace id of a connection failure, if this is one.
    #[must_use]
    pub fn connection_workspace(&self) -> Option<WorkspaceId> {
        match self {
            RouterError::Connection(e) => Some(e.workspace_id),
            RouterError::Registry(RegistryError::Connection(e)) => Some(e.workspace_id),
            RouterError::Registry(_) => None,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.connection_workspace().is_some()
    }
}
