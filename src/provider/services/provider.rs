//! Service layer for provider registration and lifecycle orchestration.
//!
//! [`ProviderService`] is the only component allowed to mutate provider
//! registry state. It composes stored metadata with live deployment state
//! on every read; deployment state is never cached.

use crate::deployment::{
    domain::{DeploymentState, LogEvent},
    ports::{DeploymentError, DeploymentManager},
};
use crate::provider::{
    domain::{
        AgentCard, Provider, ProviderId, ProviderLocation, ProviderSpec, ProviderWithState,
        RegistryEntry, UserId,
    },
    ports::{AgentCardLoader, ManifestLoadError, ProviderRegistryError, ProviderRegistryRepository},
};
use mockable::Clock;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Request payload for declaring a new provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProviderRequest {
    location: String,
    created_by: UserId,
    origin: Option<String>,
    registry: Option<String>,
    auto_stop_timeout: Duration,
    variables: BTreeMap<String, String>,
    agent_card: Option<AgentCard>,
    auto_remove: bool,
}

impl CreateProviderRequest {
    /// Creates a request for the given raw location and owner.
    #[must_use]
    pub fn new(location: impl Into<String>, created_by: UserId) -> Self {
        Self {
            location: location.into(),
            created_by,
            origin: None,
            registry: None,
            auto_stop_timeout: Duration::ZERO,
            variables: BTreeMap::new(),
            agent_card: None,
            auto_remove: false,
        }
    }

    /// Sets the origin grouping string.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Sets the registry manifest back-reference.
    #[must_use]
    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    /// Sets the idle window; zero disables auto-scale-down.
    #[must_use]
    pub const fn with_auto_stop_timeout(mut self, timeout: Duration) -> Self {
        self.auto_stop_timeout = timeout;
        self
    }

    /// Sets the deployment environment variables.
    #[must_use]
    pub fn with_variables(mut self, variables: BTreeMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    /// Supplies a pre-fetched agent card, skipping the network load.
    #[must_use]
    pub fn with_agent_card(mut self, card: AgentCard) -> Self {
        self.agent_card = Some(card);
        self
    }

    /// Makes registration replace any prior provider with the same source
    /// and owner instead of rejecting it.
    #[must_use]
    pub const fn with_auto_remove(mut self, auto_remove: bool) -> Self {
        self.auto_remove = auto_remove;
        self
    }
}

/// Aggregate error raised after a full idle scale-down pass.
///
/// Every provider is attempted independently; this collects the ones that
/// failed without blocking the rest.
#[derive(Debug, Clone, Error)]
#[error("idle scale-down sweep failed for {} provider(s)", .failures.len())]
pub struct ScaleDownSweepError {
    /// Per-provider failures, in sweep order.
    pub failures: Vec<(ProviderId, DeploymentError)>,
}

/// One failed item of a registry reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationFailure {
    /// The declared source location that failed.
    pub location: String,
    /// Human-readable failure description.
    pub reason: String,
}

/// Aggregate error raised after a full registry reconciliation pass.
#[derive(Debug, Clone, Error)]
#[error("registry reconciliation failed for {} entr(y/ies)", .failures.len())]
pub struct ReconciliationError {
    /// Per-entry failures, in manifest order (removals last).
    pub failures: Vec<ReconciliationFailure>,
}

/// Counters reported by a completed reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconciliationOutcome {
    /// Providers created for newly declared entries.
    pub created: usize,
    /// Providers whose declared configuration was refreshed.
    pub updated: usize,
    /// Providers removed because they are no longer declared.
    pub removed: usize,
}

/// Service-level errors for provider lifecycle operations.
#[derive(Debug, Error)]
pub enum ProviderServiceError {
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] ProviderRegistryError),
    /// Agent card could not be loaded.
    #[error(transparent)]
    Manifest(#[from] ManifestLoadError),
    /// Deployment orchestration failed.
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    /// No provider exists with the given identifier.
    #[error("provider {0} not found")]
    NotFound(ProviderId),
    /// The operation requires orchestrator-managed compute.
    #[error("provider {0} is network-backed and has no managed compute")]
    NotManaged(ProviderId),
    /// The idle scale-down sweep had per-provider failures.
    #[error(transparent)]
    ScaleDownSweep(#[from] ScaleDownSweepError),
    /// The registry reconciliation pass had per-entry failures.
    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),
}

/// Result type for provider service operations.
pub type ProviderServiceResult<T> = Result<T, ProviderServiceError>;

/// Provider registration and lifecycle orchestration service.
#[derive(Clone)]
pub struct ProviderService<R, D, L, C>
where
    R: ProviderRegistryRepository,
    D: DeploymentManager,
    L: AgentCardLoader,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    deployments: Arc<D>,
    card_loader: Arc<L>,
    clock: Arc<C>,
}

impl<R, D, L, C> ProviderService<R, D, L, C>
where
    R: ProviderRegistryRepository,
    D: DeploymentManager,
    L: AgentCardLoader,
    C: Clock + Send + Sync,
{
    /// Creates a new provider service.
    #[must_use]
    pub const fn new(
        repository: Arc<R>,
        deployments: Arc<D>,
        card_loader: Arc<L>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            repository,
            deployments,
            card_loader,
            clock,
        }
    }

    fn parse_location(raw: &str) -> ProviderServiceResult<ProviderLocation> {
        ProviderLocation::parse(raw).map_err(|_| {
            ProviderServiceError::Manifest(ManifestLoadError::MalformedLocation {
                location: raw.to_owned(),
            })
        })
    }

    async fn find_provider_or_error(
        &self,
        provider_id: ProviderId,
    ) -> ProviderServiceResult<Provider> {
        self.repository
            .find_by_id(provider_id)
            .await?
            .ok_or(ProviderServiceError::NotFound(provider_id))
    }

    async fn state_of(&self, provider: &Provider) -> ProviderServiceResult<DeploymentState> {
        if !provider.is_managed() {
            return Ok(DeploymentState::Running);
        }
        let states = self.deployments.state(&[provider.id()]).await?;
        Ok(states.first().copied().unwrap_or(DeploymentState::Missing))
    }

    /// Combines providers with live deployment state using one batched
    /// orchestrator query.
    async fn with_states(
        &self,
        providers: Vec<Provider>,
    ) -> ProviderServiceResult<Vec<ProviderWithState>> {
        let managed_ids: Vec<ProviderId> = providers
            .iter()
            .filter(|provider| provider.is_managed())
            .map(Provider::id)
            .collect();
        let managed_states = self.deployments.state(&managed_ids).await?;
        let by_id: std::collections::HashMap<ProviderId, DeploymentState> =
            managed_ids.into_iter().zip(managed_states).collect();

        Ok(providers
            .into_iter()
            .map(|provider| {
                let state = if provider.is_managed() {
                    by_id
                        .get(&provider.id())
                        .copied()
                        .unwrap_or(DeploymentState::Missing)
                } else {
                    DeploymentState::Running
                };
                ProviderWithState::new(provider, state)
            })
            .collect())
    }

    async fn remove_provider(&self, provider: &Provider) -> ProviderServiceResult<()> {
        self.repository.delete(provider.id()).await?;
        if provider.is_managed() {
            self.deployments.delete(provider.id()).await?;
        }
        Ok(())
    }

    /// Declares a new provider, loading its agent card unless one was
    /// pre-fetched.
    ///
    /// With `auto_remove`, any prior provider with the same source and
    /// owner is deleted first, so auto-remove providers are singletons per
    /// location.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderServiceError::Manifest`] when the location is
    /// malformed or the card cannot be loaded, repository errors (including
    /// duplicate source), and deployment errors from prior-row teardown.
    pub async fn create_provider(
        &self,
        request: CreateProviderRequest,
    ) -> ProviderServiceResult<ProviderWithState> {
        let CreateProviderRequest {
            location: raw_location,
            created_by,
            origin,
            registry,
            auto_stop_timeout,
            variables,
            agent_card,
            auto_remove,
        } = request;

        let location = Self::parse_location(&raw_location)?;
        let card = match agent_card {
            Some(card) => card,
            None => self.card_loader.load(&location).await?,
        };

        if auto_remove
            && let Some(prior) = self
                .repository
                .find_by_source(created_by, &location.normalized())
                .await?
        {
            info!(provider_id = %prior.id(), "auto-removing prior provider for re-registration");
            self.remove_provider(&prior).await?;
        }

        let provider = Provider::new(
            ProviderSpec {
                location,
                origin,
                registry,
                auto_stop_timeout,
                variables,
                agent_card: card,
                created_by,
            },
            &*self.clock,
        );
        self.repository.create(&provider).await?;
        info!(provider_id = %provider.id(), source = %provider.location(), "registered provider");

        let state = self.state_of(&provider).await?;
        Ok(ProviderWithState::new(provider, state))
    }

    /// Resolves what a registration would produce, without persisting.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderServiceError::Manifest`] when the location is
    /// malformed or the card cannot be loaded.
    pub async fn preview_provider(
        &self,
        raw_location: &str,
        created_by: UserId,
        agent_card: Option<AgentCard>,
    ) -> ProviderServiceResult<ProviderWithState> {
        let location = Self::parse_location(raw_location)?;
        let card = match agent_card {
            Some(card) => card,
            None => self.card_loader.load(&location).await?,
        };
        let provider = Provider::new(
            ProviderSpec {
                location,
                origin: None,
                registry: None,
                auto_stop_timeout: Duration::ZERO,
                variables: BTreeMap::new(),
                agent_card: card,
                created_by,
            },
            &*self.clock,
        );
        let state = self.state_of(&provider).await?;
        Ok(ProviderWithState::new(provider, state))
    }

    /// Returns all providers with live deployment state.
    ///
    /// State is recomputed at call time via a single batched orchestrator
    /// query; a stored state value is never trusted.
    ///
    /// # Errors
    ///
    /// Returns repository or deployment errors.
    pub async fn list_providers(&self) -> ProviderServiceResult<Vec<ProviderWithState>> {
        let providers = self.repository.list_all().await?;
        self.with_states(providers).await
    }

    /// Returns one provider with live deployment state.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderServiceError::NotFound`] when no provider has the
    /// given id.
    pub async fn get_provider(
        &self,
        provider_id: ProviderId,
    ) -> ProviderServiceResult<ProviderWithState> {
        let provider = self.find_provider_or_error(provider_id).await?;
        let state = self.state_of(&provider).await?;
        Ok(ProviderWithState::new(provider, state))
    }

    /// Deletes a provider and, for managed providers, its compute.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderServiceError::NotFound`] when no provider has the
    /// given id, or deployment errors from teardown.
    pub async fn delete_provider(&self, provider_id: ProviderId) -> ProviderServiceResult<()> {
        let provider = self.find_provider_or_error(provider_id).await?;
        self.remove_provider(&provider).await?;
        info!(provider_id = %provider_id, "deleted provider");
        Ok(())
    }

    /// Scales down every managed provider idle past its configured window.
    ///
    /// Each provider is attempted independently; returns the number scaled
    /// down when every attempt succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`ScaleDownSweepError`] collecting per-provider failures
    /// after the full pass, or repository/deployment errors from the
    /// initial listing.
    pub async fn scale_down_providers(&self) -> ProviderServiceResult<usize> {
        let now = self.clock.utc();
        let providers = self.repository.list_all().await?;
        let managed: Vec<&Provider> = providers
            .iter()
            .filter(|provider| provider.is_managed())
            .collect();
        let managed_ids: Vec<ProviderId> = managed.iter().map(|provider| provider.id()).collect();
        let states = self.deployments.state(&managed_ids).await?;

        let mut stopped = 0;
        let mut failures = Vec::new();
        for (provider, state) in managed.iter().zip(states) {
            if state != DeploymentState::Running || !provider.idle_expired(now) {
                continue;
            }
            match self.deployments.scale_down(provider.id()).await {
                Ok(()) => {
                    stopped += 1;
                    info!(provider_id = %provider.id(), "scaled down idle provider");
                }
                Err(err) => {
                    warn!(provider_id = %provider.id(), error = %err, "idle scale-down failed");
                    failures.push((provider.id(), err));
                }
            }
        }

        if failures.is_empty() {
            Ok(stopped)
        } else {
            Err(ScaleDownSweepError { failures }.into())
        }
    }

    /// Reconciles providers of one origin against a declared manifest.
    ///
    /// Newly declared entries are created (cards loaded per entry),
    /// existing ones have their declared configuration refreshed, and
    /// providers of this origin no longer declared are removed. Entries
    /// are attempted independently.
    ///
    /// # Errors
    ///
    /// Returns [`ReconciliationError`] collecting per-entry failures after
    /// the full pass, or repository errors from listing.
    pub async fn reconcile_registry(
        &self,
        origin: &str,
        created_by: UserId,
        entries: &[RegistryEntry],
    ) -> ProviderServiceResult<ReconciliationOutcome> {
        let mut outcome = ReconciliationOutcome::default();
        let mut failures = Vec::new();
        let mut declared: HashSet<String> = HashSet::new();

        for entry in entries {
            match self.reconcile_entry(origin, created_by, entry).await {
                Ok((normalized, action)) => {
                    declared.insert(normalized);
                    match action {
                        ReconcileAction::Created => outcome.created += 1,
                        ReconcileAction::Updated => outcome.updated += 1,
                        ReconcileAction::Unchanged => {}
                    }
                }
                Err(err) => {
                    warn!(location = %entry.location, error = %err, "registry entry failed");
                    failures.push(ReconciliationFailure {
                        location: entry.location.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        let existing = self.repository.list_by_origin(origin).await?;
        for provider in existing {
            if declared.contains(&provider.location().normalized()) {
                continue;
            }
            match self.remove_provider(&provider).await {
                Ok(()) => {
                    outcome.removed += 1;
                    info!(provider_id = %provider.id(), "removed undeclared provider");
                }
                Err(err) => failures.push(ReconciliationFailure {
                    location: provider.location().normalized(),
                    reason: err.to_string(),
                }),
            }
        }

        if failures.is_empty() {
            Ok(outcome)
        } else {
            Err(ReconciliationError { failures }.into())
        }
    }

    async fn reconcile_entry(
        &self,
        origin: &str,
        created_by: UserId,
        entry: &RegistryEntry,
    ) -> ProviderServiceResult<(String, ReconcileAction)> {
        let location = Self::parse_location(&entry.location)?;
        let normalized = location.normalized();

        if let Some(mut existing) = self.repository.find_by_id(location.derive_id()).await? {
            if existing.auto_stop_timeout() == entry.auto_stop_timeout
                && *existing.variables() == entry.variables
            {
                return Ok((normalized, ReconcileAction::Unchanged));
            }
            existing.reconfigure(entry.auto_stop_timeout, entry.variables.clone(), &*self.clock);
            self.repository.update(&existing).await?;
            return Ok((normalized, ReconcileAction::Updated));
        }

        let card = self.card_loader.load(&location).await?;
        let provider = Provider::new(
            ProviderSpec {
                location,
                origin: Some(origin.to_owned()),
                registry: Some(origin.to_owned()),
                auto_stop_timeout: entry.auto_stop_timeout,
                variables: entry.variables.clone(),
                agent_card: card,
                created_by,
            },
            &*self.clock,
        );
        self.repository.create(&provider).await?;
        Ok((normalized, ReconcileAction::Created))
    }

    /// Forwards the provider's workload logs to the sink.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderServiceError::NotFound`] for unknown ids,
    /// [`ProviderServiceError::NotManaged`] for network-backed providers,
    /// and deployment errors raised before the stream attaches.
    pub async fn stream_logs(
        &self,
        provider_id: ProviderId,
        sink: mpsc::Sender<LogEvent>,
    ) -> ProviderServiceResult<()> {
        let provider = self.find_provider_or_error(provider_id).await?;
        if !provider.is_managed() {
            return Err(ProviderServiceError::NotManaged(provider_id));
        }
        Ok(self.deployments.stream_logs(provider_id, sink).await?)
    }
}

enum ReconcileAction {
    Created,
    Updated,
    Unchanged,
}
