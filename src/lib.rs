//! Aviary: agent hosting control plane.
//!
//! This crate provides the core functionality for hosting A2A agent
//! providers: registering them from container images or network endpoints,
//! orchestrating their compute on demand, and proxying protocol traffic to
//! them with per-user request-id ownership.
//!
//! # Architecture
//!
//! Aviary follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, APIs, etc.)
//!
//! # Modules
//!
//! - [`provider`]: Provider registration, identity, and lifecycle
//! - [`deployment`]: Workload orchestration and derived deployment state
//! - [`proxy`]: A2A request routing, cold-start, and ownership tracking

pub mod deployment;
pub mod provider;
pub mod proxy;
