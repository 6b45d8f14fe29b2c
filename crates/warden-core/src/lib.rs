//! Warden core library
//!
//! Strongly typed identifiers and the error type shared by every warden
//! crate.
//!
//! # Example
//!
//! ```
//! use warden_core::{WorkspaceId, SubscriptionId};
//!
//! let workspace = WorkspaceId::new();
//! let subscription = SubscriptionId::new();
//! assert_ne!(workspace.to_string(), subscription.to_string());
//! ```

pub mod error;
pub mod ids;

pub use error::{Result, WardenError};
pub use ids::{ClientId, ParseIdError, SubscriptionId, WorkspaceId};
