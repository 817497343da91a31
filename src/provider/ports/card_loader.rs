//! Agent card loader port.

use crate::provider::domain::{AgentCard, ProviderLocation};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for agent card loading.
pub type AgentCardResult<T> = Result<T, ManifestLoadError>;

/// Contract for fetching an agent card from a provider location.
///
/// Card loading is the dominant latency and failure source on the
/// registration path; it happens over the network against the declared
/// provider itself.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentCardLoader: Send + Sync {
    /// Fetches and parses the agent card declared at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestLoadError`] when the location is malformed or the
    /// card cannot be fetched or parsed.
    async fn load(&self, location: &ProviderLocation) -> AgentCardResult<AgentCard>;
}

/// Errors raised while loading an agent card.
///
/// `MalformedLocation` maps to a client error (400-class) at the API
/// boundary; the other variants are upstream failures (502-class). None
/// are retried automatically.
#[derive(Debug, Clone, Error)]
pub enum ManifestLoadError {
    /// The location string itself is invalid.
    #[error("malformed provider location: {location}")]
    MalformedLocation {
        /// The offending location string.
        location: String,
    },

    /// The card could not be fetched from the provider.
    #[error("failed to fetch agent card from {location}: {source}")]
    Fetch {
        /// The location that was contacted.
        location: String,
        /// The underlying transport failure.
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// The fetched card could not be parsed.
    #[error("failed to parse agent card from {location}: {source}")]
    Parse {
        /// The location that was contacted.
        location: String,
        /// The underlying parse failure.
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
}

impl ManifestLoadError {
    /// Wraps a transport failure for `location`.
    pub fn fetch(
        location: impl Into<String>,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Fetch {
            location: location.into(),
            source: Arc::new(err),
        }
    }

    /// Wraps a parse failure for `location`.
    pub fn parse(
        location: impl Into<String>,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Parse {
            location: location.into(),
            source: Arc::new(err),
        }
    }

    /// Returns whether the failure is the caller's fault (400-class).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::MalformedLocation { .. })
    }
}
