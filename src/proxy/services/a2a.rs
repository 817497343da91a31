//! Service layer for A2A request proxying.
//!
//! [`A2AProxyService`] is the hot path between protocol handlers and
//! providers: it binds request ids to users, wakes cold compute, and hands
//! back a [`ProxyClient`] ready to forward traffic.

use super::ProxyClient;
use crate::deployment::{
    domain::DeploymentState,
    ports::{DeploymentError, DeploymentManager},
};
use crate::provider::{
    domain::{Provider, ProviderId, ProviderLocation, UserId},
    ports::{ProviderRegistryError, ProviderRegistryRepository},
};
use crate::proxy::{
    domain::{ContextId, TaskId},
    ports::{OwnershipError, OwnershipRepository},
};
use chrono::TimeDelta;
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Default bound on the cold-start wait.
const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(300);

/// Service-level errors for proxying operations.
#[derive(Debug, Error)]
pub enum A2AProxyError {
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] ProviderRegistryError),
    /// Deployment orchestration failed.
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    /// Request-id ownership claim failed.
    #[error(transparent)]
    Ownership(#[from] OwnershipError),
    /// No provider exists with the given identifier.
    #[error("provider {0} not found")]
    ProviderNotFound(ProviderId),
}

/// Result type for proxy service operations.
pub type A2AProxyResult<T> = Result<T, A2AProxyError>;

/// Request ids extracted from one proxied protocol request.
///
/// `allow_task_creation` distinguishes the two task-id flows: a task id
/// minted by the upstream (observed in a response) may create a record,
/// while a task id supplied by the client must already exist.
#[derive(Debug, Clone, Default)]
pub struct RequestIds {
    /// Task id embedded in the request or response, if any.
    pub task_id: Option<TaskId>,
    /// Context id embedded in the request or response, if any.
    pub context_id: Option<ContextId>,
    /// Whether an unseen task id may create a fresh record.
    pub allow_task_creation: bool,
}

/// Proxying orchestration service.
#[derive(Clone)]
pub struct A2AProxyService<R, D, O, C>
where
    R: ProviderRegistryRepository,
    D: DeploymentManager,
    O: OwnershipRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    deployments: Arc<D>,
    ownership: Arc<O>,
    clock: Arc<C>,
    http: reqwest::Client,
    startup_timeout: Duration,
}

impl<R, D, O, C> A2AProxyService<R, D, O, C>
where
    R: ProviderRegistryRepository,
    D: DeploymentManager,
    O: OwnershipRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new proxy service with the default cold-start bound.
    #[must_use]
    pub fn new(
        repository: Arc<R>,
        deployments: Arc<D>,
        ownership: Arc<O>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            repository,
            deployments,
            ownership,
            clock,
            http: reqwest::Client::new(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    /// Replaces the bound on the cold-start wait.
    #[must_use]
    pub const fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Replaces the HTTP client handed to proxy clients.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Claims ownership of the request's task and context ids for `user_id`.
    ///
    /// Both claims are atomic at the repository, so concurrent first uses
    /// of the same id resolve to one owner.
    ///
    /// # Errors
    ///
    /// Returns [`OwnershipError::TaskNotFound`] when the client continues
    /// an untracked task, and the owned-by-another-user variants when an id
    /// belongs to someone else.
    pub async fn track_request_ids_ownership(
        &self,
        user_id: UserId,
        provider_id: ProviderId,
        ids: &RequestIds,
    ) -> A2AProxyResult<()> {
        let now = self.clock.utc();
        if let Some(task_id) = &ids.task_id {
            self.ownership
                .claim_task(task_id, user_id, provider_id, ids.allow_task_creation, now)
                .await?;
        }
        if let Some(context_id) = &ids.context_id {
            self.ownership
                .claim_context(context_id, user_id, provider_id, now)
                .await?;
        }
        Ok(())
    }

    /// Resolves a provider into a ready [`ProxyClient`], waking cold
    /// compute when needed.
    ///
    /// Every call bumps the provider's `last_active_at` so the idle
    /// scale-down sweep sees proxy traffic. Network-backed providers skip
    /// orchestration entirely. For managed providers, a workload already
    /// observed in the error state fails fast without retrying; otherwise
    /// the workload is converged declaratively and awaited (bounded) when
    /// it changed or was not already running.
    ///
    /// # Errors
    ///
    /// Returns [`A2AProxyError::ProviderNotFound`] for unknown ids,
    /// [`DeploymentError::Failed`] for failing workloads,
    /// [`DeploymentError::StartupTimeout`] when the wait bound elapses, and
    /// repository or orchestrator failures otherwise.
    pub async fn get_proxy_client(&self, provider_id: ProviderId) -> A2AProxyResult<ProxyClient> {
        let provider = self
            .repository
            .find_by_id(provider_id)
            .await?
            .ok_or(A2AProxyError::ProviderNotFound(provider_id))?;

        self.repository
            .touch_last_active(provider_id, self.clock.utc())
            .await?;

        if let ProviderLocation::Network(network) = provider.location() {
            return Ok(ProxyClient::new(self.http.clone(), network.url().clone()));
        }

        self.ensure_running(&provider).await?;
        let base_url = self.deployments.provider_url(provider_id)?;
        Ok(ProxyClient::new(self.http.clone(), base_url))
    }

    async fn ensure_running(&self, provider: &Provider) -> A2AProxyResult<()> {
        let provider_id = provider.id();
        let states = self.deployments.state(&[provider_id]).await?;
        let current = states.first().copied().unwrap_or(DeploymentState::Missing);
        if current == DeploymentState::Error {
            return Err(DeploymentError::Failed { provider_id }.into());
        }

        let changed = self
            .deployments
            .create_or_replace(provider, provider.variables())
            .await?;
        if changed || current != DeploymentState::Running {
            info!(provider_id = %provider_id, state = %current, "waking provider for proxy traffic");
            self.deployments
                .wait_for_startup(provider_id, self.startup_timeout)
                .await?;
        } else {
            debug!(provider_id = %provider_id, "provider already running");
        }
        Ok(())
    }

    /// Deletes ownership records not accessed within `retention`; returns
    /// how many were removed.
    ///
    /// # Errors
    ///
    /// Returns persistence failures from the ownership repository.
    pub async fn purge_ownership_records(&self, retention: Duration) -> A2AProxyResult<u64> {
        let window = TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX);
        let cutoff = self
            .clock
            .utc()
            .checked_sub_signed(window)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);
        let removed = self.ownership.delete_accessed_before(cutoff).await?;
        if removed > 0 {
            info!(removed, "purged stale ownership records");
        }
        Ok(removed)
    }
}
