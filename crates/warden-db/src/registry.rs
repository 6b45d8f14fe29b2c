//! Workspace registry.
//!
//! The only way workspaces are created or changed. It seals connection
//! fields before they reach the store, probes isolated databases before
//! accepting them, and announces every change so cached connections can be
//! dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use warden_core::WorkspaceId;
use warden_crypto::{EncryptedField, SecretCodec};

use crate::dialect::DriverMode;
use crate::engine::ConnectionScope;
use crate::error::{DbError, RegistryError, WorkspaceConnectionError};
use crate::models::{
    ConnectionSettings, CreateWorkspace, IsolatedDatabase, UpdateWorkspace, Workspace,
};
use crate::store::WorkspaceStore;
use crate::url::DatabaseUrl;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Checks that a database accepts a connection.
#[async_trait]
pub trait ConnectionProbe: Send + Sync {
    async fn probe(&self, url: &DatabaseUrl, scope: &ConnectionScope) -> Result<(), sqlx::Error>;
}

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Database of workspaces without their own connection.
    pub default_database: DatabaseUrl,
    /// Upper bound on a connection probe during create and update.
    pub probe_timeout: Duration,
}

pub struct WorkspaceRegistry {
    store: Arc<dyn WorkspaceStore>,
    codec: Arc<SecretCodec>,
    settings: RegistrySettings,
    probe: Arc<dyn ConnectionProbe>,
    changes: broadcast::Sender<WorkspaceId>,
}

impl WorkspaceRegistry {
    pub fn new(
        store: Arc<dyn WorkspaceStore>,
        codec: Arc<SecretCodec>,
        settings: RegistrySettings,
        probe: Arc<dyn ConnectionProbe>,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            store,
            codec,
            settings,
            probe,
            changes,
        }
    }

    #[must_use]
    pub fn codec(&self) -> &Arc<SecretCodec> {
        &self.codec
    }

    #[must_use]
    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Ids of workspaces whose connection settings changed or that were
    /// archived, as they happen.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<WorkspaceId> {
        self.changes.subscribe()
    }

    /// Provision a workspace.
    ///
    /// With a `database_type`, all five connection fields are required; they
    /// are sealed and the database is probed before anything is stored.
    pub async fn create(&self, input: CreateWorkspace) -> Result<Workspace, RegistryError> {
        let name = required_text("name", &input.name)?;
        let domain = normalize_domain(&input.domain)?;

        let settings = match input.database_type {
            Some(database_type) => Some(ConnectionSettings {
                database_type,
                host: require(input.database_host, "database_host")?,
                port: require(input.database_port, "database_port")?,
                username: require(input.database_username, "database_username")?,
                password: require(input.database_password, "database_password")?,
                name: require(input.database_name, "database_name")?,
            }),
            None if has_connection_fields(&input) => {
                return Err(RegistryError::Invalid(
                    "connection fields require a database_type".to_string(),
                ));
            }
            None => None,
        };

        let mut workspace = Workspace::new(name, domain, None);
        workspace.database = settings
            .map(|s| s.seal(&self.codec))
            .transpose()
            .map_err(|source| RegistryError::Crypto {
                workspace_id: workspace.id,
                source,
            })?;

        if !workspace.uses_shared_database() {
            self.probe(&workspace).await?;
        }

        let workspace = self
            .store
            .insert(workspace)
            .await
            .map_err(|e| store_error(e, &input.domain))?;

        info!(
            target: "workspace_registry",
            workspace_id = %workspace.id,
            database_type = ?workspace.database_type(),
            "Workspace created"
        );
        Ok(workspace)
    }

    /// Apply a partial update.
    ///
    /// Only the connection fields present in `patch` are re-sealed. When the
    /// connection changes, the new settings are probed first and subscribers
    /// are told to drop any connection they hold for this workspace.
    pub async fn update(
        &self,
        id: WorkspaceId,
        patch: UpdateWorkspace,
    ) -> Result<Workspace, RegistryError> {
        let mut workspace = self.get_active(id).await?;
        let connection_changed = patch.changes_connection();

        if let Some(name) = patch.name.as_deref() {
            workspace.name = required_text("name", name)?;
        }
        if let Some(domain) = patch.domain.as_deref() {
            workspace.domain = normalize_domain(domain)?;
        }

        if patch.use_shared_database {
            if patch.database_type.is_some() {
                return Err(RegistryError::Invalid(
                    "use_shared_database conflicts with database_type".to_string(),
                ));
            }
            workspace.database = None;
        } else if connection_changed {
            workspace.database = Some(
                self.merge_connection(workspace.id, workspace.database.take(), &patch)?,
            );
        }

        if connection_changed && !workspace.uses_shared_database() {
            self.probe(&workspace).await?;
        }

        workspace.updated_at = Utc::now();
        let domain = workspace.domain.clone();
        let workspace = self
            .store
            .update(workspace)
            .await
            .map_err(|e| store_error(e, &domain))?;

        if connection_changed {
            self.announce(id);
        }
        info!(
            target: "workspace_registry",
            workspace_id = %id,
            connection_changed,
            "Workspace updated"
        );
        Ok(workspace)
    }

    fn merge_connection(
        &self,
        workspace_id: WorkspaceId,
        existing: Option<IsolatedDatabase>,
        patch: &UpdateWorkspace,
    ) -> Result<IsolatedDatabase, RegistryError> {
        let database_type = patch
            .database_type
            .or(existing.as_ref().map(|d| d.database_type))
            .ok_or(RegistryError::IncompleteConnection("database_type"))?;
        let (host, port, username, password, name) = match existing {
            Some(d) => (Some(d.host), Some(d.port), Some(d.username), Some(d.password), Some(d.name)),
            None => (None, None, None, None, None),
        };

        let codec = self.codec.as_ref();
        Ok(IsolatedDatabase {
            database_type,
            host: seal_or_keep(patch.database_host.as_ref(), host, "database_host", codec, workspace_id)?,
            port: seal_or_keep(patch.database_port.as_ref(), port, "database_port", codec, workspace_id)?,
            username: seal_or_keep(
                patch.database_username.as_ref(),
                username,
                "database_username",
                codec,
                workspace_id,
            )?,
            password: seal_or_keep(
                patch.database_password.as_ref(),
                password,
                "database_password",
                codec,
                workspace_id,
            )?,
            name: seal_or_keep(patch.database_name.as_ref(), name, "database_name", codec, workspace_id)?,
        })
    }

    /// Fetch a workspace by id, archived ones included.
    pub async fn get(&self, id: WorkspaceId) -> Result<Workspace, RegistryError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(RegistryError::NotFound(id))
    }

    async fn get_active(&self, id: WorkspaceId) -> Result<Workspace, RegistryError> {
        let workspace = self.get(id).await?;
        if workspace.is_archived() {
            return Err(RegistryError::NotFound(id));
        }
        Ok(workspace)
    }

    /// The active workspace serving `domain`.
    pub async fn get_by_domain(&self, domain: &str) -> Result<Option<Workspace>, RegistryError> {
        let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
        Ok(self.store.find_by_domain(&domain).await?)
    }

    /// Active workspaces in creation order.
    pub async fn list(&self) -> Result<Vec<Workspace>, RegistryError> {
        Ok(self.store.list().await?)
    }

    /// Soft delete. The record is kept; the workspace stops being routed.
    pub async fn archive(&self, id: WorkspaceId) -> Result<Workspace, RegistryError> {
        let mut workspace = self.get_active(id).await?;
        let now = Utc::now();
        workspace.archived_at = Some(now);
        workspace.updated_at = now;
        let workspace = self.store.update(workspace).await?;

        self.announce(id);
        info!(target: "workspace_registry", workspace_id = %id, "Workspace archived");
        Ok(workspace)
    }

    /// Connection URL of an active workspace.
    ///
    /// Resolution is pure: the same stored record always yields the same URL.
    pub async fn database_url(
        &self,
        id: WorkspaceId,
        mode: DriverMode,
    ) -> Result<DatabaseUrl, RegistryError> {
        let workspace = self.get_active(id).await?;
        self.resolve_url(&workspace, mode)
    }

    /// URL and schema scope used to open a workspace's engine.
    pub async fn connection_target(
        &self,
        id: WorkspaceId,
    ) -> Result<(DatabaseUrl, ConnectionScope), RegistryError> {
        let workspace = self.get_active(id).await?;
        let url = self.resolve_url(&workspace, DriverMode::Async)?;
        Ok((url, scope_of(&workspace)))
    }

    fn resolve_url(
        &self,
        workspace: &Workspace,
        mode: DriverMode,
    ) -> Result<DatabaseUrl, RegistryError> {
        workspace
            .database_url(&self.codec, &self.settings.default_database, mode)
            .map_err(|source| {
                warn!(
                    target: "workspace_registry",
                    workspace_id = %workspace.id,
                    error = %source,
                    "Cannot read workspace connection settings"
                );
                RegistryError::Crypto {
                    workspace_id: workspace.id,
                    source,
                }
            })
    }

    async fn probe(&self, workspace: &Workspace) -> Result<(), RegistryError> {
        let url = self.resolve_url(workspace, DriverMode::Async)?;
        let scope = scope_of(workspace);

        let reason = match tokio::time::timeout(
            self.settings.probe_timeout,
            self.probe.probe(&url, &scope),
        )
        .await
        {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("no connection within {:?}", self.settings.probe_timeout),
        };

        warn!(
            target: "workspace_registry",
            workspace_id = %workspace.id,
            database = %url,
            reason = %reason,
            "Workspace database rejected connection"
        );
        Err(WorkspaceConnectionError {
            workspace_id: workspace.id,
            reason,
        }
        .into())
    }

    fn announce(&self, id: WorkspaceId) {
        // No receivers is fine: nothing is cached yet.
        let _ = self.changes.send(id);
    }
}

fn scope_of(workspace: &Workspace) -> ConnectionScope {
    ConnectionScope {
        workspace_id: workspace.id,
        schema: workspace.schema_name(),
        shared: workspace.uses_shared_database(),
    }
}

/// Seal a new value, or keep the stored ciphertext untouched.
fn seal_or_keep<T: std::fmt::Display + std::str::FromStr>(
    new: Option<&T>,
    old: Option<EncryptedField<T>>,
    field: &'static str,
    codec: &SecretCodec,
    workspace_id: WorkspaceId,
) -> Result<EncryptedField<T>, RegistryError> {
    match (new, old) {
        (Some(value), _) => EncryptedField::seal(value, codec)
            .map_err(|source| RegistryError::Crypto { workspace_id, source }),
        (None, Some(old)) => Ok(old),
        (None, None) => Err(RegistryError::IncompleteConnection(field)),
    }
}

fn require<T>(value: Option<T>, field: &'static str) -> Result<T, RegistryError> {
    value.ok_or(RegistryError::IncompleteConnection(field))
}

fn required_text(field: &str, value: &str) -> Result<String, RegistryError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(RegistryError::Invalid(format!("{field} must not be empty")));
    }
    if value.chars().count() > 255 {
        return Err(RegistryError::Invalid(format!("{field} must be at most 255 characters")));
    }
    Ok(value.to_string())
}

fn normalize_domain(domain: &str) -> Result<String, RegistryError> {
    let domain = required_text("domain", domain)?
        .trim_end_matches('.')
        .to_ascii_lowercase();
    let valid = domain
        .split('.')
        .all(|label| !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    if !valid {
        return Err(RegistryError::Invalid(format!("invalid domain: {domain}")));
    }
    Ok(domain)
}

fn has_connection_fields(input: &CreateWorkspace) -> bool {
    input.database_host.is_some()
        || input.database_port.is_some()
        || input.database_username.is_some()
        || input.database_password.is_some()
        || input.database_name.is_some()
}

fn store_error(err: DbError, domain: &str) -> RegistryError {
    match err {
        DbError::Conflict(_) => RegistryError::DomainTaken(domain.trim().to_ascii_lowercase()),
        other => RegistryError::Store(other),
    }
}
