//! Warden database layer.
//!
//! - [`dialect`]: supported backends and their driver names
//! - [`url`]: structured connection strings
//! - [`models`]: the workspace record and the tenant-side models
//! - [`store`]: persistence of workspace records
//! - [`registry`]: create, update and resolve workspaces
//! - [`router`]: one cached engine per workspace, opened on first use

pub mod dialect;
pub mod engine;
pub mod error;
pub mod models;
pub mod registry;
pub mod router;
pub mod store;
pub mod url;

pub use dialect::{DatabaseType, DriverMode};
pub use engine::{ConnectionScope, WorkspaceEngine};
pub use error::{DbError, RegistryError, RouterError, WorkspaceConnectionError};
pub use registry::{ConnectionProbe, RegistrySettings, WorkspaceRegistry};
pub use router::{DatabaseRouter, SqlxConnector, WorkspaceConnector};
pub use store::{MemoryWorkspaceStore, PgWorkspaceStore, WorkspaceStore};
pub use url::DatabaseUrl;
