//! Service assembly.
//!
//! Builds the codec, registry, router and webhook pipeline from a
//! [`Config`] and a pair of stores. `main` uses Postgres stores; tests use
//! the in-memory ones and get the exact same wiring.

use std::sync::Arc;
use std::time::Instant;

use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;
use warden_crypto::SecretCodec;
use warden_db::{
    ConnectionProbe, DatabaseRouter, DbError, MemoryWorkspaceStore, PgWorkspaceStore,
    RegistrySettings, SqlxConnector, WorkspaceRegistry, WorkspaceStore,
};
use warden_webhooks::worker::DEFAULT_REQUEST_TIMEOUT;
use warden_webhooks::{
    ChannelTaskQueue, DeliveryTask, DeliveryWorker, FailedDeliveryLog, MemorySubscriptionStore,
    PgSubscriptionStore, RetryPolicy, SubscriptionService, SubscriptionStore, WebhookError,
    WebhookTrigger,
};

use crate::config::Config;
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Platform schema bootstrap failed: {0}")]
    Schema(#[from] DbError),

    #[error("Webhook worker setup failed: {0}")]
    Webhooks(#[from] WebhookError),
}

/// Where platform records live.
pub struct Stores {
    pub workspaces: Arc<dyn WorkspaceStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
}

impl Stores {
    /// Process-local stores. Everything is lost on restart.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            workspaces: Arc::new(MemoryWorkspaceStore::new()),
            subscriptions: Arc::new(MemorySubscriptionStore::new()),
        }
    }

    /// Postgres stores, creating their tables if missing.
    pub async fn postgres(pool: PgPool) -> Result<Self, DbError> {
        let workspaces = PgWorkspaceStore::new(pool.clone());
        workspaces.ensure_schema().await?;
        let subscriptions = PgSubscriptionStore::new(pool);
        subscriptions.ensure_schema().await?;
        info!("Platform tables ready");

        Ok(Self {
            workspaces: Arc::new(workspaces),
            subscriptions: Arc::new(subscriptions),
        })
    }
}

/// The delivery side of the webhook pipeline, not yet running.
pub struct DeliveryPipeline {
    pub worker: DeliveryWorker,
    pub receiver: mpsc::Receiver<DeliveryTask>,
}

impl DeliveryPipeline {
    /// Run the worker until every queue sender is gone.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.worker.run(self.receiver))
    }
}

/// Wire every service together.
pub fn assemble(
    config: &Config,
    stores: Stores,
) -> Result<(AppState, DeliveryPipeline), BootstrapError> {
    info!(
        workspaces = stores.workspaces.backend_name(),
        subscriptions = stores.subscriptions.backend_name(),
        "Platform stores selected"
    );
    let codec = Arc::new(SecretCodec::new(config.encryption_key.clone()));

    let connector = Arc::new(
        SqlxConnector::new(
            config.workspace_max_connections,
            config.workspace_connect_timeout,
        )
        .with_workspace_tables(config.linked_accounts),
    );
    let probe: Arc<dyn ConnectionProbe> = connector.clone();
    let registry = Arc::new(WorkspaceRegistry::new(
        stores.workspaces,
        Arc::clone(&codec),
        RegistrySettings {
            default_database: config.default_database.clone(),
            probe_timeout: config.workspace_connect_timeout,
        },
        probe,
    ));
    let router = Arc::new(DatabaseRouter::new(
        Arc::clone(&registry),
        connector,
        config.workspace_connect_timeout,
    ));

    let (queue, receiver) = ChannelTaskQueue::new(config.webhooks.queue_capacity);
    let trigger = Arc::new(WebhookTrigger::new(
        Arc::clone(&stores.subscriptions),
        Arc::new(queue),
    ));
    let subscriptions = Arc::new(
        SubscriptionService::new(stores.subscriptions, Arc::clone(&codec))
            .with_allow_http(config.webhooks.allow_http),
    );

    let failures = Arc::new(FailedDeliveryLog::default());
    let policy = RetryPolicy {
        max_attempts: config.webhooks.max_attempts,
        ..RetryPolicy::default()
    };
    let worker = DeliveryWorker::new(Arc::clone(&codec), policy, DEFAULT_REQUEST_TIMEOUT)?
        .with_failure_log(Arc::clone(&failures))
        .with_concurrency(config.webhooks.max_concurrency);

    let state = AppState {
        registry,
        router,
        codec,
        subscriptions,
        trigger,
        failures,
        startup_time: Arc::new(Instant::now()),
    };

    Ok((state, DeliveryPipeline { worker, receiver }))
}
