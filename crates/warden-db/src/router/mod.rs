//! Per-workspace database routing.
//!
//! [`DatabaseRouter`] maps a workspace id to one open engine. The engine is
//! created on first use and reused until the workspace changes, is archived,
//! or the process shuts down.
//!
//! Concurrent first requests for the same workspace share a single
//! connection attempt: each id owns an `Arc<OnceCell>` and every caller
//! awaits the same initialization. Requests for different workspaces never
//! wait on each other beyond the short map lock. A failed attempt leaves the
//! cell empty, so the next request tries again; failures are never cached and
//! never fall back to another database.
//!
//! An eviction can land while a connect is still running. The finishing
//! caller then finds its cell gone from the map, closes what it opened and
//! goes through the current cell instead. Each cell is closed at most once,
//! by whoever claims it first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use warden_core::WorkspaceId;

use crate::engine::ConnectionScope;
use crate::error::{RegistryError, RouterError, WorkspaceConnectionError};
use crate::registry::{ConnectionProbe, WorkspaceRegistry};
use crate::url::DatabaseUrl;

pub mod connector;

pub use connector::SqlxConnector;

/// Opens and closes engines. The seam between routing and the driver.
#[async_trait]
pub trait WorkspaceConnector: Send + Sync + 'static {
    type Engine: Clone + Send + Sync + 'static;

    async fn connect(
        &self,
        url: &DatabaseUrl,
        scope: &ConnectionScope,
    ) -> Result<Self::Engine, sqlx::Error>;

    /// Runs once on a freshly opened engine, before any request sees it.
    async fn prepare(&self, _engine: &Self::Engine) -> Result<(), sqlx::Error> {
        Ok(())
    }

    async fn close(&self, engine: Self::Engine);
}

#[async_trait]
impl<C: WorkspaceConnector> ConnectionProbe for C {
    async fn probe(&self, url: &DatabaseUrl, scope: &ConnectionScope) -> Result<(), sqlx::Error> {
        let engine = self.connect(url, scope).await?;
        self.close(engine).await;
        Ok(())
    }
}

struct EngineSlot<E> {
    cell: OnceCell<E>,
    closed: AtomicBool,
}

impl<E> Default for EngineSlot<E> {
    fn default() -> Self {
        Self {
            cell: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }
}

impl<E: Clone> EngineSlot<E> {
    /// The engine, if opened and not yet claimed for closing.
    fn claim(&self) -> Option<E> {
        let engine = self.cell.get()?;
        if self.closed.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(engine.clone())
    }
}

type EngineCell<E> = Arc<EngineSlot<E>>;

pub struct DatabaseRouter<C: WorkspaceConnector> {
    registry: Arc<WorkspaceRegistry>,
    connector: Arc<C>,
    engines: Mutex<HashMap<WorkspaceId, EngineCell<C::Engine>>>,
    connect_timeout: Duration,
}

impl<C: WorkspaceConnector> DatabaseRouter<C> {
    pub fn new(registry: Arc<WorkspaceRegistry>, connector: Arc<C>, connect_timeout: Duration) -> Self {
        Self {
            registry,
            connector,
            engines: Mutex::new(HashMap::new()),
            connect_timeout,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<WorkspaceRegistry> {
        &self.registry
    }

    /// The engine of `workspace_id`, opening it on first use.
    pub async fn engine(&self, workspace_id: WorkspaceId) -> Result<C::Engine, RouterError> {
        loop {
            let slot = {
                let mut engines = self.engines.lock().await;
                Arc::clone(engines.entry(workspace_id).or_default())
            };

            let result = slot
                .cell
                .get_or_try_init(|| self.open(workspace_id))
                .await
                .cloned();

            let engine = match result {
                Ok(engine) => engine,
                Err(e) => {
                    if let RouterError::Registry(RegistryError::NotFound(_)) = &e {
                        self.forget_if_empty(workspace_id, &slot).await;
                    }
                    return Err(e);
                }
            };

            if self.is_current(workspace_id, &slot).await {
                return Ok(engine);
            }

            // Evicted while opening
            if let Some(stale) = slot.claim() {
                debug!(target: "workspace_router", workspace_id = %workspace_id, "Closing engine evicted while opening");
                self.connector.close(stale).await;
            }
        }
    }

    async fn is_current(&self, workspace_id: WorkspaceId, slot: &EngineCell<C::Engine>) -> bool {
        self.engines
            .lock()
            .await
            .get(&workspace_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    async fn open(&self, workspace_id: WorkspaceId) -> Result<C::Engine, RouterError> {
        let (url, scope) = self.registry.connection_target(workspace_id).await?;

        debug!(
            target: "workspace_router",
            workspace_id = %workspace_id,
            database = %url,
            shared = scope.shared,
            "Opening workspace engine"
        );

        let opened = tokio::time::timeout(self.connect_timeout, async {
            let engine = self.connector.connect(&url, &scope).await?;
            if let Err(e) = self.connector.prepare(&engine).await {
                self.connector.close(engine).await;
                return Err(e);
            }
            Ok::<_, sqlx::Error>(engine)
        })
        .await;

        let reason = match opened {
            Ok(Ok(engine)) => {
                info!(target: "workspace_router", workspace_id = %workspace_id, "Workspace engine opened");
                return Ok(engine);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("no connection within {:?}", self.connect_timeout),
        };

        warn!(
            target: "workspace_router",
            workspace_id = %workspace_id,
            reason = %reason,
            "Workspace engine unavailable"
        );
        Err(WorkspaceConnectionError {
            workspace_id,
            reason,
        }
        .into())
    }

    /// Drop the map entry of an unknown workspace so bogus ids do not pile up.
    async fn forget_if_empty(&self, workspace_id: WorkspaceId, slot: &EngineCell<C::Engine>) {
        let mut engines = self.engines.lock().await;
        if let Some(current) = engines.get(&workspace_id) {
            if Arc::ptr_eq(current, slot) && !current.cell.initialized() {
                engines.remove(&workspace_id);
            }
        }
    }

    /// Close and forget the engine of `workspace_id`, if one is open.
    ///
    /// A connect still in flight is detached from the map; its caller closes
    /// the result and reopens with current settings.
    pub async fn evict(&self, workspace_id: WorkspaceId) -> bool {
        let slot = self.engines.lock().await.remove(&workspace_id);
        let Some(engine) = slot.and_then(|s| s.claim()) else {
            return false;
        };

        self.connector.close(engine).await;
        info!(target: "workspace_router", workspace_id = %workspace_id, "Workspace engine closed");
        true
    }

    /// Close every open engine.
    pub async fn shutdown(&self) {
        let drained: Vec<_> = self.engines.lock().await.drain().collect();
        let mut closed = 0usize;
        for (_, slot) in drained {
            if let Some(engine) = slot.claim() {
                self.connector.close(engine).await;
                closed += 1;
            }
        }
        info!(target: "workspace_router", closed, "Database router shut down");
    }

    /// Number of open engines.
    pub async fn cached_count(&self) -> usize {
        self.engines
            .lock()
            .await
            .values()
            .filter(|slot| slot.cell.initialized())
            .count()
    }

    /// Evict engines as the registry reports workspace changes.
    ///
    /// If the receiver lags behind, every engine is evicted since the missed
    /// ids are unknown.
    pub fn watch_changes(self: &Arc<Self>, mut changes: broadcast::Receiver<WorkspaceId>) -> JoinHandle<()> {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(workspace_id) => {
                        router.evict(workspace_id).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(target: "workspace_router", missed, "Missed workspace changes, evicting all engines");
                        let ids: Vec<_> = router.engines.lock().await.keys().copied().collect();
                        for id in ids {
                            router.evict(id).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
