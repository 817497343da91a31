//! In-memory repository for provider registry tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::provider::{
    domain::{Provider, ProviderId, UserId},
    ports::{ProviderRegistryError, ProviderRegistryRepository, ProviderRegistryResult},
};

/// Thread-safe in-memory provider registry repository.
///
/// The provider id is a pure function of the normalized source, so keying
/// by id also enforces source uniqueness.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProviderRegistry {
    state: Arc<RwLock<HashMap<ProviderId, Provider>>>,
}

impl InMemoryProviderRegistry {
    /// Creates an empty in-memory registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn write(
        &self,
    ) -> ProviderRegistryResult<std::sync::RwLockWriteGuard<'_, HashMap<ProviderId, Provider>>>
    {
        self.state.write().map_err(|err| {
            ProviderRegistryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn read(
        &self,
    ) -> ProviderRegistryResult<std::sync::RwLockReadGuard<'_, HashMap<ProviderId, Provider>>>
    {
        self.state.read().map_err(|err| {
            ProviderRegistryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

#[async_trait]
impl ProviderRegistryRepository for InMemoryProviderRegistry {
    async fn create(&self, provider: &Provider) -> ProviderRegistryResult<()> {
        let mut state = self.write()?;
        if state.contains_key(&provider.id()) {
            return Err(ProviderRegistryError::DuplicateSource {
                normalized: provider.location().normalized(),
            });
        }
        state.insert(provider.id(), provider.clone());
        Ok(())
    }

    async fn update(&self, provider: &Provider) -> ProviderRegistryResult<()> {
        let mut state = self.write()?;
        if !state.contains_key(&provider.id()) {
            return Err(ProviderRegistryError::NotFound(provider.id()));
        }
        state.insert(provider.id(), provider.clone());
        Ok(())
    }

    async fn touch_last_active(
        &self,
        id: ProviderId,
        at: DateTime<Utc>,
    ) -> ProviderRegistryResult<()> {
        let mut state = self.write()?;
        let provider = state
            .get(&id)
            .ok_or(ProviderRegistryError::NotFound(id))?
            .clone();
        let mut data = crate::provider::domain::PersistedProviderData {
            id: provider.id(),
            location: provider.location().clone(),
            origin: provider.origin().to_owned(),
            registry: provider.registry().map(str::to_owned),
            auto_stop_timeout: provider.auto_stop_timeout(),
            variables: provider.variables().clone(),
            agent_card: provider.agent_card().clone(),
            created_by: provider.created_by(),
            created_at: provider.created_at(),
            updated_at: provider.updated_at(),
            last_active_at: provider.last_active_at(),
        };
        data.last_active_at = at;
        state.insert(id, Provider::from_persisted(data));
        Ok(())
    }

    async fn find_by_id(&self, id: ProviderId) -> ProviderRegistryResult<Option<Provider>> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn find_by_source(
        &self,
        owner: UserId,
        normalized_source: &str,
    ) -> ProviderRegistryResult<Option<Provider>> {
        let state = self.read()?;
        Ok(state
            .values()
            .find(|provider| {
                provider.created_by() == owner
                    && provider.location().normalized() == normalized_source
            })
            .cloned())
    }

    async fn list_all(&self) -> ProviderRegistryResult<Vec<Provider>> {
        let state = self.read()?;
        let mut providers: Vec<Provider> = state.values().cloned().collect();
        providers.sort_by_key(|provider| provider.created_at());
        Ok(providers)
    }

    async fn list_by_origin(&self, origin: &str) -> ProviderRegistryResult<Vec<Provider>> {
        let state = self.read()?;
        let mut providers: Vec<Provider> = state
            .values()
            .filter(|provider| provider.origin() == origin)
            .cloned()
            .collect();
        providers.sort_by_key(|provider| provider.created_at());
        Ok(providers)
    }

    async fn delete(&self, id: ProviderId) -> ProviderRegistryResult<bool> {
        Ok(self.write()?.remove(&id).is_some())
    }
}
