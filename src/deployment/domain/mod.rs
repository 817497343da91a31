//! Domain model for provider deployment lifecycle.
//!
//! Models the derived deployment state machine, the declarative workload
//! manifests submitted to the orchestrator, and typed log-stream events.

mod error;
mod log;
mod manifest;
mod state;

pub use error::ParseDeploymentStateError;
pub use log::LogEvent;
pub use manifest::{DeploymentManifest, MANAGED_BY, ResourceLimits, workload_name};
pub use state::{DeploymentObservation, DeploymentState};
