//! HTTP adapters for provider ports.

mod card_loader;

pub use card_loader::HttpAgentCardLoader;
