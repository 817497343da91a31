//! Adapter implementations for deployment orchestration ports.

pub mod kubernetes;
pub mod memory;

pub use memory::{DeploymentCall, InMemoryDeploymentManager};
