//! Repository port for provider registry persistence.

use crate::provider::domain::{Provider, ProviderId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for provider registry operations.
pub type ProviderRegistryResult<T> = Result<T, ProviderRegistryError>;

/// Provider registry persistence contract.
#[async_trait]
pub trait ProviderRegistryRepository: Send + Sync {
    /// Stores a new provider.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderRegistryError::DuplicateSource`] when a provider
    /// with the same normalized source already exists for the owner.
    async fn create(&self, provider: &Provider) -> ProviderRegistryResult<()>;

    /// Persists changes to an existing provider (variables, card,
    /// timestamps).
    ///
    /// # Errors
    ///
    /// Returns [`ProviderRegistryError::NotFound`] when the provider does
    /// not exist.
    async fn update(&self, provider: &Provider) -> ProviderRegistryResult<()>;

    /// Single-field write of `last_active_at` for the proxy hot path.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderRegistryError::NotFound`] when the provider does
    /// not exist.
    async fn touch_last_active(
        &self,
        id: ProviderId,
        at: DateTime<Utc>,
    ) -> ProviderRegistryResult<()>;

    /// Finds a provider by identifier.
    ///
    /// Returns `None` when no provider has the given id.
    async fn find_by_id(&self, id: ProviderId) -> ProviderRegistryResult<Option<Provider>>;

    /// Finds a provider by owner and normalized source string.
    async fn find_by_source(
        &self,
        owner: UserId,
        normalized_source: &str,
    ) -> ProviderRegistryResult<Option<Provider>>;

    /// Returns all registered providers.
    async fn list_all(&self) -> ProviderRegistryResult<Vec<Provider>>;

    /// Returns providers declared by the given origin.
    async fn list_by_origin(&self, origin: &str) -> ProviderRegistryResult<Vec<Provider>>;

    /// Deletes a provider row; returns whether a row existed.
    async fn delete(&self, id: ProviderId) -> ProviderRegistryResult<bool>;
}

/// Errors returned by provider registry repository implementations.
#[derive(Debug, Clone, Error)]
pub enum ProviderRegistryError {
    /// A provider with the same normalized source already exists.
    #[error("duplicate provider source: {normalized}")]
    DuplicateSource {
        /// The conflicting normalized source string.
        normalized: String,
    },

    /// The provider was not found.
    #[error("provider not found: {0}")]
    NotFound(ProviderId),

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ProviderRegistryError {
    /// Wraps a data-quality or deserialization error from persisted rows.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
