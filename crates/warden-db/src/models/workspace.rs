//! Workspace model.
//!
//! A workspace is a tenant. It either shares the platform database (its data
//! lives in a schema named after its id) or points at an isolated database
//! whose connection fields are stored encrypted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use warden_core::WorkspaceId;
use warden_crypto::{CryptoError, EncryptedField, SecretCodec};

use crate::dialect::{DatabaseType, DriverMode};
use crate::error::DbError;
use crate::url::DatabaseUrl;

/// Connection fields of an isolated workspace database, sealed at rest.
///
/// Holding all five fields in one value makes a half-configured workspace
/// unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolatedDatabase {
    pub database_type: DatabaseType,
    pub host: EncryptedField<String>,
    pub port: EncryptedField<u16>,
    pub username: EncryptedField<String>,
    pub password: EncryptedField<String>,
    pub name: EncryptedField<String>,
}

impl IsolatedDatabase {
    /// Decrypt every field.
    pub fn open(&self, codec: &SecretCodec) -> Result<ConnectionSettings, CryptoError> {
        Ok(ConnectionSettings {
            database_type: self.database_type,
            host: self.host.open(codec)?,
            port: self.port.open(codec)?,
            username: self.username.open(codec)?,
            password: self.password.open(codec)?,
            name: self.name.open(codec)?,
        })
    }
}

/// Plaintext connection fields, alive only while a URL is being built.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub database_type: DatabaseType,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub name: String,
}

impl ConnectionSettings {
    /// Encrypt every field.
    pub fn seal(&self, codec: &SecretCodec) -> Result<IsolatedDatabase, CryptoError> {
        Ok(IsolatedDatabase {
            database_type: self.database_type,
            host: EncryptedField::seal(&self.host, codec)?,
            port: EncryptedField::seal(&self.port, codec)?,
            username: EncryptedField::seal(&self.username, codec)?,
            password: EncryptedField::seal(&self.password, codec)?,
            name: EncryptedField::seal(&self.name, codec)?,
        })
    }

    fn into_url(self, mode: DriverMode) -> DatabaseUrl {
        DatabaseUrl {
            database_type: self.database_type,
            mode,
            username: Some(self.username),
            password: Some(self.password),
            host: Some(self.host),
            port: Some(self.port),
            database: Some(self.name),
        }
    }
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("database_type", &self.database_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("name", &self.name)
            .finish()
    }
}

/// A tenant of the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    /// Host name requests for this workspace arrive on.
    pub domain: String,
    /// `None` means the workspace lives in the shared default database.
    pub database: Option<IsolatedDatabase>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft delete marker. Archived workspaces are never routed.
    pub archived_at: Option<DateTime<Utc>>,
}

impl Workspace {
    /// A new workspace record.
    #[must_use]
    pub fn new(name: String, domain: String, database: Option<IsolatedDatabase>) -> Self {
        let now = Utc::now();
        Self {
            id: WorkspaceId::new(),
            name,
            domain,
            database,
            created_at: now,
            updated_at: now,
            archived_at: None,
        }
    }

    /// Schema (or database) name holding this workspace's data.
    ///
    /// Derived from the id, never user supplied.
    #[must_use]
    pub fn schema_name(&self) -> String {
        self.id.to_string()
    }

    /// Dialect of the isolated database, `None` when shared.
    #[must_use]
    pub fn database_type(&self) -> Option<DatabaseType> {
        self.database.as_ref().map(|d| d.database_type)
    }

    #[must_use]
    pub fn uses_shared_database(&self) -> bool {
        self.database.is_none()
    }

    #[must_use]
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    /// Resolve the connection URL for this workspace.
    ///
    /// A shared workspace gets `default` with the requested driver flavour.
    /// An isolated one gets its decrypted fields. Either way, when the
    /// resulting dialect is file based the database component becomes
    /// `<id>.db`, so two SQLite workspaces never share a file.
    pub fn database_url(
        &self,
        codec: &SecretCodec,
        default: &DatabaseUrl,
        mode: DriverMode,
    ) -> Result<DatabaseUrl, CryptoError> {
        let url = match &self.database {
            None => default.clone().with_mode(mode),
            Some(isolated) => isolated.open(codec)?.into_url(mode),
        };

        if url.database_type.is_file_based() {
            Ok(url.with_database(format!("{}.db", self.id)))
        } else {
            Ok(url)
        }
    }
}

/// Input for creating a workspace.
///
/// The connection fields are plaintext and are sealed by the registry before
/// anything is stored.
#[derive(Clone, Default, Deserialize)]
pub struct CreateWorkspace {
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub database_type: Option<DatabaseType>,
    #[serde(default)]
    pub database_host: Option<String>,
    #[serde(default)]
    pub database_port: Option<u16>,
    #[serde(default)]
    pub database_username: Option<String>,
    #[serde(default)]
    pub database_password: Option<String>,
    #[serde(default)]
    pub database_name: Option<String>,
}

/// Partial update of a workspace. Unset fields are left alone.
#[derive(Clone, Default, Deserialize)]
pub struct UpdateWorkspace {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    /// Move the workspace back to the shared database, dropping its
    /// isolated connection.
    #[serde(default)]
    pub use_shared_database: bool,
    #[serde(default)]
    pub database_type: Option<DatabaseType>,
    #[serde(default)]
    pub database_host: Option<String>,
    #[serde(default)]
    pub database_port: Option<u16>,
    #[serde(default)]
    pub database_username: Option<String>,
    #[serde(default)]
    pub database_password: Option<String>,
    #[serde(default)]
    pub database_name: Option<String>,
}

impl UpdateWorkspace {
    /// Whether the patch touches connection settings.
    #[must_use]
    pub fn changes_connection(&self) -> bool {
        self.use_shared_database
            || self.database_type.is_some()
            || self.database_host.is_some()
            || self.database_port.is_some()
            || self.database_username.is_some()
            || self.database_password.is_some()
            || self.database_name.is_some()
    }
}

macro_rules! redacted_debug {
    ($name:ident { $($field:ident),* }) => {
        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    $(.field(stringify!($field), &self.$field))*
                    .field("database_password", &self.database_password.as_ref().map(|_| "[REDACTED]"))
                    .finish()
            }
        }
    };
}

redacted_debug!(CreateWorkspace {
    name, domain, database_type, database_host, database_port, database_username, database_name
});
redacted_debug!(UpdateWorkspace {
    name, domain, use_shared_database, database_type, database_host, database_port,
    database_username, database_name
});

/// Row of the `warden_workspaces` table.
#[derive(Debug, Clone, FromRow)]
pub struct WorkspaceRow {
    pub id: Uuid,
    pub name: String,
    pub domain: String,
    pub database_type: Option<String>,
    pub database_host: Option<String>,
    pub database_port: Option<String>,
    pub database_username: Option<String>,
    pub database_password: Option<String>,
    pub database_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl TryFrom<WorkspaceRow> for Workspace {
    type Error = DbError;

    fn try_from(row: WorkspaceRow) -> Result<Self, Self::Error> {
        let database = match row.database_type {
            None => None,
            Some(database_type) => {
                let missing = |field: &str| {
                    DbError::ValidationFailed(format!(
                        "workspace {} has database_type but no {field}",
                        row.id
                    ))
                };
                Some(IsolatedDatabase {
                    database_type: database_type.parse()?,
                    host: row
                        .database_host
                        .map(EncryptedField::from_ciphertext)
                        .ok_or_else(|| missing("database_host"))?,
                    port: row
                        .database_port
                        .map(EncryptedField::from_ciphertext)
                        .ok_or_else(|| missing("database_port"))?,
                    username: row
                        .database_username
                        .map(EncryptedField::from_ciphertext)
                        .ok_or_else(|| missing("database_username"))?,
                    password: row
                        .database_password
                        .map(EncryptedField::from_ciphertext)
                        .ok_or_else(|| missing("database_password"))?,
                    name: row
                        .database_name
                        .map(EncryptedField::from_ciphertext)
                        .ok_or_else(|| missing("database_name"))?,
                })
            }
        };

        Ok(Self {
            id: WorkspaceId::from_uuid(row.id),
            name: row.name,
            domain: row.domain,
            database,
            created_at: row.created_at,
            updated_at: row.updated_at,
            archived_at: row.archived_at,
        })
    }
}

impl From<&Workspace> for WorkspaceRow {
    fn from(workspace: &Workspace) -> Self {
        let db = workspace.database.as_ref();
        Self {
            id: workspace.id.into_uuid(),
            name: workspace.name.clone(),
            domain: workspace.domain.clone(),
            database_type: db.map(|d| d.database_type.to_string()),
            database_host: db.map(|d| d.host.ciphertext().to_string()),
            database_port: db.map(|d| d.port.ciphertext().to_string()),
            database_username: db.map(|d| d.username.ciphertext().to_string()),
            database_password: db.map(|d| d.password.ciphertext().to_string()),
            database_name: db.map(|d| d.name.ciphertext().to_string()),
            created_at: workspace.created_at,
            updated_at: workspace.updated_at,
            archived_at: workspace.archived_at,
        }
    }
}
