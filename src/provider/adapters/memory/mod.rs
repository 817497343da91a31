//! In-memory adapters for provider ports.

mod card_loader;
mod registry;

pub use card_loader::InMemoryAgentCardLoader;
pub use registry::InMemoryProviderRegistry;
