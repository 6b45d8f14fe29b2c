//! Application state shared across all request handlers.
//!
//! Cloned per request; every member is behind an `Arc`.

use std::sync::Arc;
use std::time::Instant;

use warden_crypto::SecretCodec;
use warden_db::{DatabaseRouter, SqlxConnector, WorkspaceRegistry};
use warden_webhooks::{FailedDeliveryLog, SubscriptionService, WebhookTrigger};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<WorkspaceRegistry>,

    /// Per-workspace engines.
    pub router: Arc<DatabaseRouter<SqlxConnector>>,

    pub codec: Arc<SecretCodec>,

    pub subscriptions: Arc<SubscriptionService>,

    pub trigger: Arc<WebhookTrigger>,

    /// Deliveries the worker gave up on.
    pub failures: Arc<FailedDeliveryLog>,

    /// Service startup time for uptime calculation
    pub startup_time: Arc<Instant>,
}

impl AppState {
    /// Seconds since startup.
    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.startup_time.elapsed().as_secs()
    }
}
