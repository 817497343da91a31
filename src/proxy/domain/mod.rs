//! Domain model for A2A request proxying and ownership tracking.
//!
//! Models the identifiers embedded in proxied protocol requests and the
//! ownership records that bind them to the user who first used them.

mod error;
mod ids;
mod ownership;

pub use error::RequestIdError;
pub use ids::{ContextId, TaskId};
pub use ownership::{ContextOwnership, TaskOwnership};
