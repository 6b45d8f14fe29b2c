//! Dispatch of domain events to subscriptions.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::*;
use warden_core::WorkspaceId;
use warden_webhooks::models::CreateSubscriptionRequest;
use warden_webhooks::{
    ClientSchema, EventSelector, MemorySubscriptionStore, QueueError, SubscriptionService,
    WebhookEnvelope, WebhookEventType, WebhookSchema, WebhookTrigger,
};

struct Fixture {
    service: SubscriptionService,
    trigger: WebhookTrigger,
    queue: Arc<RecordingQueue>,
}

impl Fixture {
    fn new() -> Self {
        init_test_logging();
        let store = Arc::new(MemorySubscriptionStore::new());
        let queue = RecordingQueue::new();
        Self {
            service: SubscriptionService::new(store.clone(), test_codec()),
            trigger: WebhookTrigger::new(store, queue.clone()),
            queue,
        }
    }

    async fn subscribe(&self, workspace_id: WorkspaceId, url: &str, events: &[&str]) {
        self.service
            .create(
                workspace_id,
                CreateSubscriptionRequest {
                    name: "hook".to_string(),
                    url: url.to_string(),
                    secret: Some(SECRET_1.to_string()),
                    events: EventSelector::from_names(events).unwrap(),
                },
            )
            .await
            .unwrap();
    }
}

static PROJECTIONS: AtomicUsize = AtomicUsize::new(0);

/// Counts how often it is asked to serialize.
struct CountingSchema;

impl WebhookSchema for CountingSchema {
    type Object = String;

    const OBJECT: &'static str = "Counted";
    const VERSION: u32 = 1;

    fn project(object: &String) -> Result<serde_json::Value, serde_json::Error> {
        PROJECTIONS.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::json!({ "id": object }))
    }
}

#[tokio::test]
async fn test_client_created_reaches_subscription() {
    let fx = Fixture::new();
    let workspace_id = WorkspaceId::new();
    fx.subscribe(workspace_id, "https://hooks.example.com/in", &["object.created"])
        .await;
    let client = sample_client(workspace_id);

    let enqueued = fx
        .trigger
        .trigger::<ClientSchema>(WebhookEventType::ObjectCreated, &client, workspace_id)
        .await
        .unwrap();

    assert_eq!(enqueued, 1);
    let tasks = fx.queue.tasks();
    assert_eq!(tasks.len(), 1);
    let task = &tasks[0];
    assert_eq!(task.workspace_id.to_string(), workspace_id.to_string());
    assert_eq!(task.url, "https://hooks.example.com/in");
    assert_eq!(task.attempt, 0);
    assert_eq!(task.schema_version, ClientSchema::VERSION);

    let envelope: WebhookEnvelope = serde_json::from_str(&task.event).unwrap();
    assert_eq!(envelope.event_type, WebhookEventType::ObjectCreated);
    assert_eq!(envelope.object, "Client");
    assert_eq!(envelope.data["id"], client.id.to_string());

    let raw: serde_json::Value = serde_json::from_str(&task.event).unwrap();
    assert_eq!(raw["type"], "object.created");
    assert_eq!(raw.as_object().unwrap().len(), 3);
}

#[tokio::test]
async fn test_no_subscription_means_no_serialization() {
    let fx = Fixture::new();
    let before = PROJECTIONS.load(Ordering::SeqCst);

    let enqueued = fx
        .trigger
        .trigger::<CountingSchema>(
            WebhookEventType::ObjectCreated,
            &"obj-1".to_string(),
            WorkspaceId::new(),
        )
        .await
        .unwrap();

    assert_eq!(enqueued, 0);
    assert_eq!(fx.queue.len(), 0);
    assert_eq!(PROJECTIONS.load(Ordering::SeqCst), before);
}

#[tokio::test]
async fn test_non_matching_event_type_is_not_enqueued() {
    let fx = Fixture::new();
    let workspace_id = WorkspaceId::new();
    fx.subscribe(workspace_id, "https://hooks.example.com/in", &["object.deleted"])
        .await;

    let enqueued = fx
        .trigger
        .trigger::<ClientSchema>(
            WebhookEventType::ObjectCreated,
            &sample_client(workspace_id),
            workspace_id,
        )
        .await
        .unwrap();

    assert_eq!(enqueued, 0);
    assert_eq!(fx.queue.len(), 0);
}

#[tokio::test]
async fn test_wildcard_subscription_receives_every_type() {
    let fx = Fixture::new();
    let workspace_id = WorkspaceId::new();
    fx.subscribe(workspace_id, "https://hooks.example.com/all", &["*"]).await;
    let client = sample_client(workspace_id);

    for event_type in WebhookEventType::ALL {
        fx.trigger
            .trigger::<ClientSchema>(event_type, &client, workspace_id)
            .await
            .unwrap();
    }
    assert_eq!(fx.queue.len(), 3);
}

#[tokio::test]
async fn test_only_enabled_subscriptions_of_the_workspace() {
    let fx = Fixture::new();
    let workspace_id = WorkspaceId::new();
    let other = WorkspaceId::new();

    fx.subscribe(workspace_id, "https://a.example.com/in", &["*"]).await;
    fx.subscribe(workspace_id, "https://b.example.com/in", &["*"]).await;
    fx.subscribe(other, "https://other.example.com/in", &["*"]).await;

    let listed = fx.service.list(workspace_id).await.unwrap();
    fx.service.disable(workspace_id, listed[0].id).await.unwrap();

    let enqueued = fx
        .trigger
        .trigger::<ClientSchema>(
            WebhookEventType::ObjectUpdated,
            &sample_client(workspace_id),
            workspace_id,
        )
        .await
        .unwrap();

    assert_eq!(enqueued, 1);
    assert_eq!(fx.queue.tasks()[0].url, "https://b.example.com/in");
}

#[tokio::test]
async fn test_tasks_follow_subscription_creation_order() {
    let fx = Fixture::new();
    let workspace_id = WorkspaceId::new();
    let urls = [
        "https://one.example.com/in",
        "https://two.example.com/in",
        "https://three.example.com/in",
    ];
    for url in urls {
        fx.subscribe(workspace_id, url, &["object.created"]).await;
    }

    fx.trigger
        .trigger::<ClientSchema>(
            WebhookEventType::ObjectCreated,
            &sample_client(workspace_id),
            workspace_id,
        )
        .await
        .unwrap();

    let delivered: Vec<_> = fx.queue.tasks().into_iter().map(|t| t.url).collect();
    assert_eq!(delivered, urls);

    // Every task carries the same envelope bytes
    let tasks = fx.queue.tasks();
    assert!(tasks.windows(2).all(|w| w[0].event == w[1].event));
}

#[tokio::test]
async fn test_refused_tasks_are_not_counted() {
    let fx = Fixture::new();
    let workspace_id = WorkspaceId::new();
    fx.subscribe(workspace_id, "https://hooks.example.com/in", &["*"]).await;
    fx.queue.reject_with(QueueError::Full);

    let enqueued = fx
        .trigger
        .trigger::<ClientSchema>(
            WebhookEventType::ObjectDeleted,
            &sample_client(workspace_id),
            workspace_id,
        )
        .await
        .unwrap();

    assert_eq!(enqueued, 0);
}
