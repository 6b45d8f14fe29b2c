//! Shared fixtures for warden-webhooks integration tests.
//!
//! Wiremock responders that capture or script endpoint behavior, a queue
//! that records tasks instead of sending them, and sample domain objects.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use chrono::Utc;
use warden_core::{ClientId, WorkspaceId};
use warden_crypto::{MasterKey, SecretCodec};
use warden_db::models::{Client, ClientType};
use warden_webhooks::{DeliveryTask, QueueError, RetryPolicy, TaskQueue};
use wiremock::{Request, Respond, ResponseTemplate};

pub const SECRET_1: &str = "whsec_test_secret_key_12345";
pub const SECRET_2: &str = "whsec_another_secret_67890";

static INIT: Once = Once::new();

/// Log to stderr when RUST_LOG is set.
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        }
    });
}

pub fn test_codec() -> Arc<SecretCodec> {
    Arc::new(SecretCodec::new(MasterKey::new([0x42; 32])))
}

/// Millisecond backoff so retry tests finish quickly.
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
    }
}

pub fn sample_client(workspace_id: WorkspaceId) -> Client {
    let now = Utc::now();
    Client {
        id: ClientId::new(),
        workspace_id,
        name: "Default client".to_string(),
        client_id: "c0ffee".to_string(),
        client_secret: None,
        client_type: ClientType::Public,
        redirect_uris: vec!["https://app.example.com/callback".to_string()],
        created_at: now,
        updated_at: now,
    }
}

// ---------------------------------------------------------------------------
// RecordingQueue - keeps tasks for inspection
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingQueue {
    tasks: Mutex<Vec<DeliveryTask>>,
    reject: Mutex<Option<QueueError>>,
}

impl RecordingQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Refuse every following task with `error`.
    pub fn reject_with(&self, error: QueueError) {
        *self.reject.lock().unwrap() = Some(error);
    }

    pub fn tasks(&self) -> Vec<DeliveryTask> {
        self.tasks.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }
}

impl TaskQueue for RecordingQueue {
    fn enqueue(&self, task: DeliveryTask) -> Result<(), QueueError> {
        if let Some(error) = *self.reject.lock().unwrap() {
            return Err(error);
        }
        self.tasks.lock().unwrap().push(task);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CaptureResponder - captures requests and returns a fixed status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl CapturedRequest {
    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Header value by name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone)]
pub struct CaptureResponder {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    response_code: u16,
    delay: Option<Duration>,
}

impl CaptureResponder {
    pub fn new() -> Self {
        Self::with_status(200)
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            response_code: status,
            delay: None,
        }
    }

    /// Capture on arrival, answer 200 after `delay`.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Respond for CaptureResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let captured = CapturedRequest {
            body: request.body.clone(),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect(),
        };
        self.requests.lock().unwrap().push(captured);
        let response = ResponseTemplate::new(self.response_code);
        match self.delay {
            Some(delay) => response.set_delay(delay),
            None => response,
        }
    }
}

// ---------------------------------------------------------------------------
// FailingResponder - fails N times then succeeds
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct FailingResponder {
    attempt_count: Arc<AtomicU32>,
    failures_before_success: u32,
    failure_code: u16,
    failure_delay: Option<Duration>,
}

impl FailingResponder {
    /// Fail `n` times with 500, then return 200.
    pub fn fail_times(n: u32) -> Self {
        Self::fail_with_status(n, 500)
    }

    pub fn fail_with_status(n: u32, failure_code: u16) -> Self {
        Self {
            attempt_count: Arc::new(AtomicU32::new(0)),
            failures_before_success: n,
            failure_code,
            failure_delay: None,
        }
    }

    /// Answer the first `n` requests only after `delay`.
    pub fn slow_times(n: u32, delay: Duration) -> Self {
        Self {
            attempt_count: Arc::new(AtomicU32::new(0)),
            failures_before_success: n,
            failure_code: 200,
            failure_delay: Some(delay),
        }
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count.load(Ordering::SeqCst)
    }
}

impl Respond for FailingResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.attempt_count.fetch_add(1, Ordering::SeqCst);
        if n >= self.failures_before_success {
            return ResponseTemplate::new(200);
        }
        let template = ResponseTemplate::new(self.failure_code);
        match self.failure_delay {
            Some(delay) => template.set_delay(delay),
            None => template,
        }
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
