//! Port contracts for provider deployment orchestration.
//!
//! Ports define infrastructure-agnostic interfaces consumed by the
//! provider and proxy services.

pub mod manager;

pub use manager::{DeploymentError, DeploymentManager, DeploymentResult};
