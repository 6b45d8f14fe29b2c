//! Warden API
//!
//! HTTP front of the platform: workspace administration, workspace-scoped
//! tenant data and webhook subscriptions, plus the background delivery
//! worker.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod routes;
pub mod state;

pub use bootstrap::{assemble, DeliveryPipeline, Stores};
pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::AppState;
