//! Payload schemas of webhook objects.
//!
//! A schema decides what of a domain object leaves the platform. Projections
//! are whitelists: a field that is not written here is never delivered.

use chrono::{DateTime, Utc};
use serde::Serialize;
use warden_db::models::{Client, ClientType};

/// Describes how one kind of domain object is serialized into `data`.
pub trait WebhookSchema {
    type Object;

    /// Canonical type name, sent as the envelope's `object`.
    const OBJECT: &'static str;

    /// Bumped whenever the projection changes shape.
    const VERSION: u32;

    fn project(object: &Self::Object) -> Result<serde_json::Value, serde_json::Error>;
}

/// Schema of OAuth clients. The client secret is never part of it.
#[derive(Debug, Clone, Copy)]
pub struct ClientSchema;

#[derive(Serialize)]
struct ClientData<'a> {
    id: String,
    workspace_id: String,
    name: &'a str,
    client_id: &'a str,
    client_type: ClientType,
    redirect_uris: &'a [String],
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WebhookSchema for ClientSchema {
    type Object = Client;

    const OBJECT: &'static str = "Client";
    const VERSION: u32 = 1;

    fn project(client: &Client) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(ClientData {
            id: client.id.to_string(),
            workspace_id: client.workspace_id.to_string(),
            name: &client.name,
            client_id: &client.client_id,
            client_type: client.client_type,
            redirect_uris: &client.redirect_uris,
            created_at: client.created_at,
            updated_at: client.updated_at,
        })
    }
}
