//! HTTP agent card loader.

use async_trait::async_trait;
use url::Url;

use crate::provider::{
    domain::{AgentCard, ProviderLocation},
    ports::{AgentCardLoader, AgentCardResult, ManifestLoadError},
};

/// Well-known path serving an agent's card.
const AGENT_CARD_PATH: &str = ".well-known/agent.json";

/// Agent card loader that fetches `/.well-known/agent.json` over HTTP.
///
/// Network-backed providers are fetched directly. Image-backed providers
/// cannot be contacted before they are deployed, so registration records a
/// minimal card named after the image repository; the card refreshes once
/// the workload serves traffic.
#[derive(Debug, Clone, Default)]
pub struct HttpAgentCardLoader {
    http: reqwest::Client,
}

impl HttpAgentCardLoader {
    /// Creates a loader with a default HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a loader reusing an existing HTTP client.
    #[must_use]
    pub const fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Fetches and parses a card from an explicit base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestLoadError`] on transport or parse failure.
    pub async fn fetch_card(&self, base: &Url) -> AgentCardResult<AgentCard> {
        let location = base.to_string();
        let card_url = base
            .join(AGENT_CARD_PATH)
            .map_err(|err| ManifestLoadError::fetch(location.clone(), err))?;
        let response = self
            .http
            .get(card_url)
            .send()
            .await
            .map_err(|err| ManifestLoadError::fetch(location.clone(), err))?;
        let checked = response
            .error_for_status()
            .map_err(|err| ManifestLoadError::fetch(location.clone(), err))?;
        checked
            .json::<AgentCard>()
            .await
            .map_err(|err| ManifestLoadError::parse(location, err))
    }
}

#[async_trait]
impl AgentCardLoader for HttpAgentCardLoader {
    async fn load(&self, location: &ProviderLocation) -> AgentCardResult<AgentCard> {
        match location {
            ProviderLocation::Network(network) => self.fetch_card(network.url()).await,
            ProviderLocation::Image(image) => {
                let name = image
                    .repository()
                    .rsplit('/')
                    .next()
                    .unwrap_or(image.repository());
                Ok(AgentCard::named(name))
            }
        }
    }
}
