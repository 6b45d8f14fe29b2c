//! Signed HTTP delivery, retries and failure recording.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use warden_core::{SubscriptionId, WorkspaceId};
use warden_crypto::{verify_signature, EncryptedField};
use warden_webhooks::{
    ChannelTaskQueue, ClientSchema, DeliveryError, DeliveryOutcome, DeliveryTask, DeliveryWorker,
    EventSelector, MemorySubscriptionStore, SubscriptionStore, TaskQueue, WebhookEventType,
    WebhookSubscription, WebhookTrigger,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

const BODY: &str = r#"{"type":"object.created","object":"Client","data":{"id":"1"}}"#;

fn worker(max_attempts: u32) -> DeliveryWorker {
    init_test_logging();
    DeliveryWorker::new(test_codec(), fast_policy(max_attempts), Duration::from_secs(5)).unwrap()
}

fn task(url: String, secret: &str) -> DeliveryTask {
    DeliveryTask {
        event: BODY.to_string(),
        schema_version: 1,
        url,
        secret: EncryptedField::seal(&secret.to_string(), &test_codec()).unwrap(),
        workspace_id: WorkspaceId::new(),
        subscription_id: SubscriptionId::new(),
        attempt: 0,
    }
}

async fn mount(server: &MockServer, responder: impl wiremock::Respond + 'static) {
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(responder)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_delivery_is_signed_over_exact_bytes() {
    let server = MockServer::start().await;
    let capture = CaptureResponder::new();
    mount(&server, capture.clone()).await;

    let task = task(format!("{}/webhook", server.uri()), SECRET_1);
    let workspace_id = task.workspace_id;
    let outcome = worker(3).deliver(task).await;

    assert!(matches!(outcome, DeliveryOutcome::Delivered { status: 200 }));
    let requests = capture.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    assert_eq!(request.body, BODY.as_bytes());
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(
        request.header("x-warden-workspace"),
        Some(workspace_id.to_string().as_str())
    );
    assert_eq!(request.header("x-warden-schema-version"), Some("1"));

    let timestamp = request.header("x-warden-timestamp").unwrap();
    let signature = request
        .header("x-warden-signature")
        .unwrap()
        .strip_prefix("sha256=")
        .unwrap();
    assert!(verify_signature(signature, SECRET_1, timestamp, &request.body));
    assert!(!verify_signature(signature, SECRET_2, timestamp, &request.body));
}

#[tokio::test]
async fn test_server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    let failing = FailingResponder::fail_times(2);
    mount(&server, failing.clone()).await;

    let worker = worker(6);
    let outcome = worker
        .deliver(task(format!("{}/webhook", server.uri()), SECRET_1))
        .await;

    assert!(outcome.is_delivered());
    assert_eq!(failing.attempt_count(), 3);
    assert!(worker.failures().is_empty().await);
}

#[tokio::test]
async fn test_rate_limited_is_retried() {
    let server = MockServer::start().await;
    let failing = FailingResponder::fail_with_status(1, 429);
    mount(&server, failing.clone()).await;

    let outcome = worker(3)
        .deliver(task(format!("{}/webhook", server.uri()), SECRET_1))
        .await;

    assert!(outcome.is_delivered());
    assert_eq!(failing.attempt_count(), 2);
}

#[tokio::test]
async fn test_client_errors_are_permanent() {
    let server = MockServer::start().await;
    let capture = CaptureResponder::with_status(400);
    mount(&server, capture.clone()).await;

    let worker = worker(6);
    let task = task(format!("{}/webhook", server.uri()), SECRET_1);
    let subscription_id = task.subscription_id;
    let outcome = worker.deliver(task).await;

    assert!(matches!(
        outcome,
        DeliveryOutcome::Permanent(DeliveryError::Status(400))
    ));
    assert_eq!(capture.request_count(), 1);

    let failures = worker.failures().entries().await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].subscription_id, subscription_id);
    assert_eq!(failures[0].attempts, 1);
    assert!(failures[0].permanent);
}

#[tokio::test]
async fn test_exhausted_retries_are_recorded() {
    let server = MockServer::start().await;
    let capture = CaptureResponder::with_status(503);
    mount(&server, capture.clone()).await;

    let worker = worker(4);
    let outcome = worker
        .deliver(task(format!("{}/webhook", server.uri()), SECRET_1))
        .await;

    assert!(matches!(outcome, DeliveryOutcome::Retry(DeliveryError::Status(503))));
    assert_eq!(capture.request_count(), 4);

    let failures = worker.failures().entries().await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].attempts, 4);
    assert!(!failures[0].permanent);
    assert_eq!(failures[0].error, "HTTP 503");
}

#[tokio::test]
async fn test_timeouts_are_retried() {
    let server = MockServer::start().await;
    let slow = FailingResponder::slow_times(1, Duration::from_millis(500));
    mount(&server, slow.clone()).await;

    let worker = DeliveryWorker::new(test_codec(), fast_policy(3), Duration::from_millis(100)).unwrap();
    let outcome = worker
        .deliver(task(format!("{}/webhook", server.uri()), SECRET_1))
        .await;

    assert!(outcome.is_delivered());
    assert_eq!(slow.attempt_count(), 2);
}

#[tokio::test]
async fn test_unreadable_secret_is_not_sent() {
    let server = MockServer::start().await;
    let capture = CaptureResponder::new();
    mount(&server, capture.clone()).await;

    let mut task = task(format!("{}/webhook", server.uri()), SECRET_1);
    task.secret = EncryptedField::from_ciphertext("bm90IGEgcmVhbCBibG9i");
    let outcome = worker(6).deliver(task).await;

    assert!(matches!(outcome, DeliveryOutcome::Permanent(DeliveryError::Secret(_))));
    assert_eq!(capture.request_count(), 0);
}

#[tokio::test]
async fn test_worker_drains_queue_end_to_end() {
    let server = MockServer::start().await;
    let capture = CaptureResponder::new();
    mount(&server, capture.clone()).await;

    // Inserted directly: the mock server listens on loopback, which the
    // subscription service refuses.
    let store = Arc::new(MemorySubscriptionStore::new());
    let workspace_id = WorkspaceId::new();
    let now = chrono::Utc::now();
    store
        .insert(WebhookSubscription {
            id: SubscriptionId::new(),
            workspace_id,
            name: "local".to_string(),
            url: format!("{}/webhook", server.uri()),
            secret: EncryptedField::seal(&SECRET_2.to_string(), &test_codec()).unwrap(),
            events: EventSelector::All,
            enabled: true,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();

    let (queue, receiver) = ChannelTaskQueue::new(16);
    let trigger = WebhookTrigger::new(store, Arc::new(queue));

    let handle = tokio::spawn(worker(3).run(receiver));

    let client = sample_client(workspace_id);
    let enqueued = trigger
        .trigger::<ClientSchema>(WebhookEventType::ObjectCreated, &client, workspace_id)
        .await
        .unwrap();
    assert_eq!(enqueued, 1);

    assert!(eventually(|| capture.request_count() == 1).await);
    let request = &capture.requests()[0];
    let body: serde_json::Value = request.body_json().unwrap();
    assert_eq!(body["object"], "Client");
    assert_eq!(body["data"]["id"], client.id.to_string());

    let timestamp = request.header("x-warden-timestamp").unwrap();
    let signature = &request.header("x-warden-signature").unwrap()["sha256=".len()..];
    assert!(verify_signature(signature, SECRET_2, timestamp, &request.body));

    // Dropping the last sender stops the worker
    drop(trigger);
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_worker_caps_deliveries_in_flight() {
    let server = MockServer::start().await;
    let capture = CaptureResponder::slow(Duration::from_millis(300));
    mount(&server, capture.clone()).await;

    let (queue, receiver) = ChannelTaskQueue::new(16);
    let handle = tokio::spawn(worker(1).with_concurrency(2).run(receiver));

    let url = format!("{}/webhook", server.uri());
    for _ in 0..6 {
        queue.enqueue(task(url.clone(), SECRET_1)).unwrap();
    }

    // Two slots, each held for the whole response delay
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(capture.request_count(), 2);

    assert!(eventually(|| capture.request_count() == 6).await);
    drop(queue);
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
}
