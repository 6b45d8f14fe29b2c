//! Shared helpers for API tests.
//!
//! The app is assembled exactly as in `main`, with in-memory platform stores
//! and SQLite as the shared tenant database, so every workspace gets its own
//! `<workspace-id>.db` in the working directory.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Once;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use warden_api::{assemble, router, AppState, Config, Stores};
use warden_webhooks::DeliveryTask;

static INIT: Once = Once::new();

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

pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("DATABASE_URL", "sqlite:platform.db?mode=rwc"),
        (
            "WARDEN_ENCRYPTION_KEY",
            "6b9d3c1f0a2e4d5c8b7a69584736251403f2e1d0c9b8a7968574635241302f1e",
        ),
        ("WORKSPACE_CONNECT_TIMEOUT_SECS", "1"),
        ("WEBHOOK_QUEUE_CAPACITY", "32"),
    ]);
    Config::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap()
}

pub struct TestApp {
    pub state: AppState,
    pub app: Router,
    /// Tasks the trigger queued. The worker is not running.
    pub deliveries: mpsc::Receiver<DeliveryTask>,
    workspaces: Vec<String>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        init_test_logging();
        let (state, pipeline) = assemble(&test_config(), Stores::in_memory()).unwrap();
        Self {
            app: router(state.clone()),
            state,
            deliveries: pipeline.receiver,
            workspaces: Vec::new(),
        }
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        TestResponse { status, body }
    }

    /// Create a shared-database workspace and return its id.
    pub async fn workspace(&mut self, domain: &str) -> String {
        let response = self
            .send(
                "POST",
                "/workspaces",
                &[],
                Some(serde_json::json!({ "name": domain, "domain": domain })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        let id = response.body["id"].as_str().unwrap().to_string();
        self.workspaces.push(id.clone());
        id
    }

    /// Queued delivery tasks, without waiting.
    pub fn queued(&mut self) -> Vec<DeliveryTask> {
        let mut tasks = Vec::new();
        while let Ok(task) = self.deliveries.try_recv() {
            tasks.push(task);
        }
        tasks
    }

    pub async fn cleanup(self) {
        self.state.router.shutdown().await;
        for id in self.workspaces {
            for suffix in ["", "-wal", "-shm"] {
                let _ = std::fs::remove_file(format!("{id}.db{suffix}"));
            }
        }
    }
}
