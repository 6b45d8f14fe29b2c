//! Delivery worker: signs and POSTs queued envelopes.
//!
//! Each task runs on its own tokio task so a slow endpoint never holds up
//! other deliveries, with at most `concurrency` deliveries in flight. While
//! every slot is busy the worker stops reading, so the queue fills and
//! producers see backpressure. Transient failures (timeouts, connection errors, 5xx,
//! 429) are retried with exponential backoff up to the attempt limit;
//! anything else fails immediately. Failed deliveries end up in the
//! [`FailedDeliveryLog`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinSet;
use warden_core::{SubscriptionId, WorkspaceId};
use warden_crypto::{sign_payload, SecretCodec};

use crate::error::{DeliveryError, WebhookError};
use crate::queue::DeliveryTask;

pub const SIGNATURE_HEADER: &str = "X-Warden-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Warden-Timestamp";
pub const WORKSPACE_HEADER: &str = "X-Warden-Workspace";
pub const SCHEMA_VERSION_HEADER: &str = "X-Warden-Schema-Version";

/// Default maximum delivery attempts per task (initial + 5 retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;

/// Default number of failures kept for operators.
pub const DEFAULT_FAILURE_LOG_CAPACITY: usize = 1000;

/// Default number of deliveries in flight at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 32;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Wait before the next attempt, after `attempts` attempts have failed:
    /// `base * 2^(attempts - 1)`, capped at `max_delay`.
    #[must_use]
    pub fn delay_after(&self, attempts: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempts.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    #[must_use]
    pub fn allows_another(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// Result of one delivery attempt.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Delivered { status: u16 },
    Retry(DeliveryError),
    Permanent(DeliveryError),
}

impl DeliveryOutcome {
    fn from_error(error: DeliveryError) -> Self {
        if error.is_retryable() {
            DeliveryOutcome::Retry(error)
        } else {
            DeliveryOutcome::Permanent(error)
        }
    }

    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// A delivery that will not be attempted again.
#[derive(Debug, Clone, Serialize)]
pub struct FailedDelivery {
    pub workspace_id: WorkspaceId,
    pub subscription_id: SubscriptionId,
    pub url: String,
    pub attempts: u32,
    pub error: String,
    /// True when the endpoint rejected the request outright, false when
    /// retries ran out.
    pub permanent: bool,
    pub failed_at: DateTime<Utc>,
}

/// Most recent failed deliveries, oldest dropped first.
#[derive(Debug)]
pub struct FailedDeliveryLog {
    capacity: usize,
    entries: Mutex<VecDeque<FailedDelivery>>,
}

impl Default for FailedDeliveryLog {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_LOG_CAPACITY)
    }
}

impl FailedDeliveryLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn record(&self, failure: FailedDelivery) {
        let mut entries = self.entries.lock().await;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(failure);
    }

    /// Oldest first.
    pub async fn entries(&self) -> Vec<FailedDelivery> {
        self.entries.lock().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[derive(Clone)]
pub struct DeliveryWorker {
    client: Client,
    codec: Arc<SecretCodec>,
    policy: RetryPolicy,
    failures: Arc<FailedDeliveryLog>,
    concurrency: usize,
}

impl DeliveryWorker {
    /// Build a worker with its own HTTP client. Redirects are not followed.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Internal` if the HTTP client cannot be built.
    pub fn new(
        codec: Arc<SecretCodec>,
        policy: RetryPolicy,
        request_timeout: Duration,
    ) -> Result<Self, WebhookError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("warden-webhooks/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WebhookError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            codec,
            policy,
            failures: Arc::new(FailedDeliveryLog::default()),
            concurrency: DEFAULT_MAX_CONCURRENCY,
        })
    }

    /// Cap on deliveries in flight. At least one.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_failure_log(mut self, failures: Arc<FailedDeliveryLog>) -> Self {
        self.failures = failures;
        self
    }

    #[must_use]
    pub fn failures(&self) -> &Arc<FailedDeliveryLog> {
        &self.failures
    }

    /// Drain `tasks` until every sender is dropped, then wait for in-flight
    /// deliveries.
    pub async fn run(self, mut tasks: mpsc::Receiver<DeliveryTask>) {
        let mut in_flight = JoinSet::new();
        let slots = Arc::new(Semaphore::new(self.concurrency));
        tracing::info!(
            target: "webhook_delivery",
            concurrency = self.concurrency,
            "Delivery worker started"
        );

        loop {
            // Wait for a free slot before taking the next task
            let permit = tokio::select! {
                permit = Arc::clone(&slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_join_error(joined);
                    continue;
                }
            };

            tokio::select! {
                next = tasks.recv() => match next {
                    Some(task) => {
                        let worker = self.clone();
                        in_flight.spawn(async move {
                            let _permit = permit;
                            worker.deliver(task).await;
                        });
                    }
                    None => break,
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_join_error(joined);
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            log_join_error(joined);
        }
        tracing::info!(target: "webhook_delivery", "Delivery worker stopped");
    }

    /// Deliver one task, retrying transient failures per the policy.
    pub async fn deliver(&self, mut task: DeliveryTask) -> DeliveryOutcome {
        loop {
            let start = Instant::now();
            let outcome = self.attempt(&task).await;
            let latency_ms = start.elapsed().as_millis() as u64;
            task.attempt += 1;

            match outcome {
                DeliveryOutcome::Delivered { status } => {
                    tracing::info!(
                        target: "webhook_delivery",
                        workspace_id = %task.workspace_id,
                        subscription_id = %task.subscription_id,
                        response_code = status,
                        latency_ms,
                        attempt_number = task.attempt,
                        "Webhook delivery succeeded"
                    );
                    return DeliveryOutcome::Delivered { status };
                }
                DeliveryOutcome::Retry(error) if self.policy.allows_another(task.attempt) => {
                    let delay = self.policy.delay_after(task.attempt);
                    tracing::warn!(
                        target: "webhook_delivery",
                        workspace_id = %task.workspace_id,
                        subscription_id = %task.subscription_id,
                        error = %error,
                        latency_ms,
                        attempt_number = task.attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        "Webhook delivery failed, will retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                DeliveryOutcome::Retry(error) => {
                    self.give_up(&task, &error, false).await;
                    return DeliveryOutcome::Retry(error);
                }
                DeliveryOutcome::Permanent(error) => {
                    self.give_up(&task, &error, true).await;
                    return DeliveryOutcome::Permanent(error);
                }
            }
        }
    }

    /// One signed POST of the task's envelope.
    pub async fn attempt(&self, task: &DeliveryTask) -> DeliveryOutcome {
        let secret = match task.secret.open(&self.codec) {
            Ok(secret) => secret,
            Err(e) => return DeliveryOutcome::Permanent(DeliveryError::Secret(e)),
        };

        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_payload(&secret, &timestamp, task.event.as_bytes());

        let result = self
            .client
            .post(&task.url)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, format!("sha256={signature}"))
            .header(TIMESTAMP_HEADER, timestamp)
            .header(WORKSPACE_HEADER, task.workspace_id.to_string())
            .header(SCHEMA_VERSION_HEADER, task.schema_version.to_string())
            .body(task.event.clone())
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => DeliveryOutcome::Delivered {
                status: response.status().as_u16(),
            },
            Ok(response) => {
                DeliveryOutcome::from_error(DeliveryError::Status(response.status().as_u16()))
            }
            Err(e) => DeliveryOutcome::from_error(DeliveryError::from(e)),
        }
    }

    async fn give_up(&self, task: &DeliveryTask, error: &DeliveryError, permanent: bool) {
        tracing::warn!(
            target: "webhook_delivery",
            workspace_id = %task.workspace_id,
            subscription_id = %task.subscription_id,
            error = %error,
            attempt_number = task.attempt,
            permanent,
            "Webhook delivery abandoned"
        );
        self.failures
            .record(FailedDelivery {
                workspace_id: task.workspace_id,
                subscription_id: task.subscription_id,
                url: task.url.clone(),
                attempts: task.attempt,
                error: error.to_string(),
                permanent,
                failed_at: Utc::now(),
            })
            .await;
    }
}

fn log_join_error(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(target: "webhook_delivery", error = %e, "Delivery task aborted");
    }
}
