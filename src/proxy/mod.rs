//! A2A request proxying: ownership tracking and cold-start routing.
//!
//! Proxying a protocol request has two halves: binding the request's task
//! and context ids to the calling user, and resolving the target provider
//! into a reachable endpoint (waking its compute when scaled down). The
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
