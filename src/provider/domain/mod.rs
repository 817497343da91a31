//! Domain model for provider registration and lifecycle.
//!
//! The provider domain models the deployable-agent aggregate: its
//! deterministic identity, source location forms, fetched agent card, and
//! idle-expiry rules. Infrastructure concerns stay outside this boundary.

mod agent_card;
mod error;
mod ids;
mod location;
mod provider;

pub use agent_card::{AgentCard, AgentCardCapabilities, AgentVariableDeclaration};
pub use error::ProviderDomainError;
pub use ids::{ProviderId, UserId};
pub use location::{ImageLocation, NetworkLocation, ProviderLocation};
pub use provider::{
    PersistedProviderData, Provider, ProviderSpec, ProviderWithState, RegistryEntry,
};
