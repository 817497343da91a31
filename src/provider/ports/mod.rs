//! Port contracts for provider registration and lifecycle.
//!
//! Ports define infrastructure-agnostic interfaces used by the provider
//! service.

pub mod card_loader;
pub mod repository;

pub use card_loader::{AgentCardLoader, AgentCardResult, ManifestLoadError};
pub use repository::{ProviderRegistryError, ProviderRegistryRepository, ProviderRegistryResult};

#[cfg(test)]
pub use card_loader::MockAgentCardLoader;
