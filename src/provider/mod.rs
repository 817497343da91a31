//! Provider registration and lifecycle management.
//!
//! A provider is a declared, deployable agent: either a container image
//! the orchestrator manages or a network endpoint assumed reachable. The
//! module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
