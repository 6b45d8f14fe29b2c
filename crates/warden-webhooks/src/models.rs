//! Webhook event types, subscriptions and their API shapes.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_core::{SubscriptionId, WorkspaceId};
use warden_crypto::EncryptedField;

use crate::error::WebhookError;

/// Selector value that subscribes to every event type.
pub const ALL_EVENTS: &str = "*";

/// Kind of change an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WebhookEventType {
    #[serde(rename = "object.created")]
    ObjectCreated,
    #[serde(rename = "object.updated")]
    ObjectUpdated,
    #[serde(rename = "object.deleted")]
    ObjectDeleted,
}

impl WebhookEventType {
    pub const ALL: [WebhookEventType; 3] = [
        WebhookEventType::ObjectCreated,
        WebhookEventType::ObjectUpdated,
        WebhookEventType::ObjectDeleted,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            WebhookEventType::ObjectCreated => "object.created",
            WebhookEventType::ObjectUpdated => "object.updated",
            WebhookEventType::ObjectDeleted => "object.deleted",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            WebhookEventType::ObjectCreated => "An object was created in the workspace",
            WebhookEventType::ObjectUpdated => "An object of the workspace was modified",
            WebhookEventType::ObjectDeleted => "An object was removed from the workspace",
        }
    }
}

impl fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The event types a subscription receives.
///
/// Persisted and exchanged as a list of event type names, where `"*"`
/// stands for every type, including types added later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub enum EventSelector {
    All,
    Only(BTreeSet<WebhookEventType>),
}

impl EventSelector {
    #[must_use]
    pub fn matches(&self, event_type: WebhookEventType) -> bool {
        match self {
            EventSelector::All => true,
            EventSelector::Only(types) => types.contains(&event_type),
        }
    }

    /// Parse stored or submitted names. An empty list and unknown names are
    /// rejected.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, WebhookError> {
        if names.is_empty() {
            return Err(WebhookError::Validation(
                "At least one event type is required".to_string(),
            ));
        }
        let mut types = BTreeSet::new();
        for name in names {
            let name = name.as_ref();
            if name == ALL_EVENTS {
                return Ok(EventSelector::All);
            }
            let event_type = WebhookEventType::parse(name)
                .ok_or_else(|| WebhookError::Validation(format!("Unknown event type: {name}")))?;
            types.insert(event_type);
        }
        Ok(EventSelector::Only(types))
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        match self {
            EventSelector::All => vec![ALL_EVENTS.to_string()],
            EventSelector::Only(types) => types.iter().map(|t| t.as_str().to_string()).collect(),
        }
    }
}

impl TryFrom<Vec<String>> for EventSelector {
    type Error = WebhookError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_names(&names)
    }
}

impl From<EventSelector> for Vec<String> {
    fn from(selector: EventSelector) -> Self {
        selector.names()
    }
}

/// A registered webhook endpoint of one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSubscription {
    pub id: SubscriptionId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub url: String,
    pub secret: EncryptedField<String>,
    pub events: EventSelector,
    /// Disabled subscriptions are kept but skipped at dispatch.
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Request/response shapes
// ---------------------------------------------------------------------------

#[derive(Clone, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub name: String,
    pub url: String,
    /// Generated when absent.
    #[serde(default)]
    pub secret: Option<String>,
    pub events: EventSelector,
}

impl fmt::Debug for CreateSubscriptionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateSubscriptionRequest")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("events", &self.events)
            .finish()
    }
}

#[derive(Clone, Default, Deserialize)]
pub struct UpdateSubscriptionRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub secret: Option<String>,
    pub events: Option<EventSelector>,
    pub enabled: Option<bool>,
}

impl fmt::Debug for UpdateSubscriptionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateSubscriptionRequest")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("events", &self.events)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// A subscription as returned by the API. Never carries the secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub id: SubscriptionId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub url: String,
    pub events: EventSelector,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&WebhookSubscription> for SubscriptionResponse {
    fn from(sub: &WebhookSubscription) -> Self {
        Self {
            id: sub.id,
            workspace_id: sub.workspace_id,
            name: sub.name.clone(),
            url: sub.url.clone(),
            events: sub.events.clone(),
            enabled: sub.enabled,
            created_at: sub.created_at,
            updated_at: sub.updated_at,
        }
    }
}

/// Response to a create call: the only time the signing secret is shown.
#[derive(Clone, Serialize, Deserialize)]
pub struct CreatedSubscriptionResponse {
    #[serde(flatten)]
    pub subscription: SubscriptionResponse,
    pub secret: String,
}

impl fmt::Debug for CreatedSubscriptionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedSubscriptionResponse")
            .field("subscription", &self.subscription)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventTypeInfo {
    pub event_type: WebhookEventType,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventTypeListResponse {
    pub event_types: Vec<EventTypeInfo>,
}

impl EventTypeListResponse {
    #[must_use]
    pub fn all() -> Self {
        Self {
            event_types: WebhookEventType::ALL
                .into_iter()
                .map(|event_type| EventTypeInfo {
                    event_type,
                    description: event_type.description(),
                })
                .collect(),
        }
    }
}
