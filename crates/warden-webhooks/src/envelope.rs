//! The webhook payload body.

use serde::{Deserialize, Serialize};

use crate::models::WebhookEventType;
use crate::schema::WebhookSchema;

/// Body of every webhook request: `{"type", "object", "data"}`.
///
/// The workspace id is not part of the body; it travels as delivery
/// metadata. The JSON produced by [`WebhookEnvelope::to_json`] is the exact
/// byte sequence that is signed and sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub event_type: WebhookEventType,
    pub object: String,
    pub data: serde_json::Value,
}

impl WebhookEnvelope {
    /// Project `object` through schema `S`.
    pub fn build<S: WebhookSchema>(
        event_type: WebhookEventType,
        object: &S::Object,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type,
            object: S::OBJECT.to_string(),
            data: S::project(object)?,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
