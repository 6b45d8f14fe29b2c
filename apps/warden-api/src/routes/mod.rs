//! Route table.
//!
//! Platform routes (`/health`, `/workspaces`) are global. Everything else
//! runs behind [`resolve_workspace`] and sees a
//! [`WorkspaceContext`](crate::middleware::WorkspaceContext).

pub mod clients;
pub mod database;
pub mod health;
pub mod subscriptions;
pub mod workspaces;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::middleware::resolve_workspace;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let scoped = Router::new()
        .route(
            "/webhooks/subscriptions",
            post(subscriptions::create_subscription).get(subscriptions::list_subscriptions),
        )
        .route(
            "/webhooks/subscriptions/:id",
            get(subscriptions::get_subscription)
                .patch(subscriptions::update_subscription)
                .delete(subscriptions::delete_subscription),
        )
        .route("/webhooks/event-types", get(subscriptions::list_event_types))
        .route("/webhooks/failures", get(subscriptions::list_failures))
        .route("/database/ping", get(database::ping))
        .route(
            "/clients",
            post(clients::create_client).get(clients::list_clients),
        )
        .route(
            "/clients/:id",
            get(clients::get_client).delete(clients::delete_client),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_workspace,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route(
            "/workspaces",
            post(workspaces::create_workspace).get(workspaces::list_workspaces),
        )
        .route(
            "/workspaces/:id",
            get(workspaces::get_workspace)
                .patch(workspaces::update_workspace)
                .delete(workspaces::archive_workspace),
        )
        .merge(scoped)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
