//! In-memory agent card loader for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::provider::{
    domain::{AgentCard, ProviderLocation},
    ports::{AgentCardLoader, AgentCardResult, ManifestLoadError},
};

/// In-memory agent card loader keyed by normalized location.
///
/// Unseeded locations fail with a fetch error, mirroring an unreachable
/// provider.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAgentCardLoader {
    cards: Arc<RwLock<HashMap<String, AgentCard>>>,
}

impl InMemoryAgentCardLoader {
    /// Creates an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the card served for a location.
    ///
    /// # Errors
    ///
    /// Returns a fetch error when lock acquisition fails.
    pub fn set_card(&self, location: &ProviderLocation, card: AgentCard) -> AgentCardResult<()> {
        let mut cards = self.cards.write().map_err(|err| {
            ManifestLoadError::fetch(location.normalized(), std::io::Error::other(err.to_string()))
        })?;
        cards.insert(location.normalized(), card);
        Ok(())
    }
}

#[async_trait]
impl AgentCardLoader for InMemoryAgentCardLoader {
    async fn load(&self, location: &ProviderLocation) -> AgentCardResult<AgentCard> {
        let normalized = location.normalized();
        let cards = self.cards.read().map_err(|err| {
            ManifestLoadError::fetch(normalized.clone(), std::io::Error::other(err.to_string()))
        })?;
        cards.get(&normalized).cloned().ok_or_else(|| {
            ManifestLoadError::fetch(
                normalized.clone(),
                std::io::Error::other("no card seeded for location"),
            )
        })
    }
}
