//! Provider aggregate root.

use super::{AgentCard, ProviderId, ProviderLocation, UserId};
use crate::deployment::domain::DeploymentState;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Parameter object for declaring a new provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSpec {
    /// Source location (image or network endpoint).
    pub location: ProviderLocation,
    /// Origin grouping; defaults to the location's registry/host.
    pub origin: Option<String>,
    /// Back-reference to the registry manifest entry that declared this
    /// provider, when it came from a reconciliation pass.
    pub registry: Option<String>,
    /// Idle window after which compute is scaled down; zero disables.
    pub auto_stop_timeout: Duration,
    /// Environment variables injected into the deployment.
    pub variables: BTreeMap<String, String>,
    /// Agent card fetched from the provider.
    pub agent_card: AgentCard,
    /// Owning user.
    pub created_by: UserId,
}

/// Parameter object for reconstructing a persisted provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedProviderData {
    /// Persisted provider identifier.
    pub id: ProviderId,
    /// Persisted source location.
    pub location: ProviderLocation,
    /// Persisted origin grouping.
    pub origin: String,
    /// Persisted registry back-reference.
    pub registry: Option<String>,
    /// Persisted idle window.
    pub auto_stop_timeout: Duration,
    /// Persisted deployment environment variables.
    pub variables: BTreeMap<String, String>,
    /// Persisted agent card.
    pub agent_card: AgentCard,
    /// Persisted owner.
    pub created_by: UserId,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Persisted latest proxied-request timestamp.
    pub last_active_at: DateTime<Utc>,
}

/// A declared, deployable agent provider.
///
/// The aggregate id is a pure function of the normalized source location
/// (see [`ProviderId::from_source`]); construction always re-derives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    id: ProviderId,
    location: ProviderLocation,
    origin: String,
    registry: Option<String>,
    auto_stop_timeout: Duration,
    variables: BTreeMap<String, String>,
    agent_card: AgentCard,
    created_by: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_active_at: DateTime<Utc>,
}

impl Provider {
    /// Creates a new provider with its id derived from the location.
    #[must_use]
    pub fn new(spec: ProviderSpec, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        let origin = spec
            .origin
            .unwrap_or_else(|| spec.location.default_origin());
        Self {
            id: spec.location.derive_id(),
            location: spec.location,
            origin,
            registry: spec.registry,
            auto_stop_timeout: spec.auto_stop_timeout,
            variables: spec.variables,
            agent_card: spec.agent_card,
            created_by: spec.created_by,
            created_at: timestamp,
            updated_at: timestamp,
            last_active_at: timestamp,
        }
    }

    /// Reconstructs a provider from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedProviderData) -> Self {
        Self {
            id: data.id,
            location: data.location,
            origin: data.origin,
            registry: data.registry,
            auto_stop_timeout: data.auto_stop_timeout,
            variables: data.variables,
            agent_card: data.agent_card,
            created_by: data.created_by,
            created_at: data.created_at,
            updated_at: data.updated_at,
            last_active_at: data.last_active_at,
        }
    }

    /// Returns the provider identifier.
    #[must_use]
    pub const fn id(&self) -> ProviderId {
        self.id
    }

    /// Returns the source location.
    #[must_use]
    pub const fn location(&self) -> &ProviderLocation {
        &self.location
    }

    /// Returns the origin grouping string.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Returns the registry manifest back-reference, if any.
    #[must_use]
    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    /// Returns the idle window; zero disables auto-scale-down.
    #[must_use]
    pub const fn auto_stop_timeout(&self) -> Duration {
        self.auto_stop_timeout
    }

    /// Returns the deployment environment variables.
    #[must_use]
    pub const fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    /// Returns the agent card.
    #[must_use]
    pub const fn agent_card(&self) -> &AgentCard {
        &self.agent_card
    }

    /// Returns the owning user.
    #[must_use]
    pub const fn created_by(&self) -> UserId {
        self.created_by
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the latest proxied-request timestamp.
    #[must_use]
    pub const fn last_active_at(&self) -> DateTime<Utc> {
        self.last_active_at
    }

    /// Returns whether the provider has orchestrator-managed compute.
    #[must_use]
    pub const fn is_managed(&self) -> bool {
        self.location.is_managed()
    }

    /// Records a successful proxied request at the current clock time.
    pub fn mark_active(&mut self, clock: &impl Clock) {
        self.last_active_at = clock.utc();
    }

    /// Replaces the idle window and deployment environment variables.
    pub fn reconfigure(
        &mut self,
        auto_stop_timeout: Duration,
        variables: BTreeMap<String, String>,
        clock: &impl Clock,
    ) {
        self.auto_stop_timeout = auto_stop_timeout;
        self.variables = variables;
        self.updated_at = clock.utc();
    }

    /// Returns whether the idle window has elapsed at `now`.
    ///
    /// Unmanaged providers and providers with a zero timeout never expire.
    #[must_use]
    pub fn idle_expired(&self, now: DateTime<Utc>) -> bool {
        if !self.is_managed() || self.auto_stop_timeout.is_zero() {
            return false;
        }
        let window = TimeDelta::from_std(self.auto_stop_timeout).unwrap_or(TimeDelta::MAX);
        self.last_active_at
            .checked_add_signed(window)
            .is_some_and(|deadline| deadline < now)
    }
}

/// A provider enriched with its live deployment state.
///
/// The state is recomputed from the orchestrator on every read; it is
/// never persisted or cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderWithState {
    provider: Provider,
    state: DeploymentState,
}

impl ProviderWithState {
    /// Combines a provider with its observed deployment state.
    #[must_use]
    pub const fn new(provider: Provider, state: DeploymentState) -> Self {
        Self { provider, state }
    }

    /// Returns the provider.
    #[must_use]
    pub const fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Returns the observed deployment state.
    #[must_use]
    pub const fn state(&self) -> DeploymentState {
        self.state
    }

    /// Decomposes into the provider, discarding the state.
    #[must_use]
    pub fn into_provider(self) -> Provider {
        self.provider
    }
}

/// One entry declared by an external registry manifest.
///
/// Reconciliation creates providers for newly declared entries and removes
/// providers of the same origin that are no longer declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Raw source location string as declared by the manifest.
    pub location: String,
    /// Declared idle window; zero disables auto-scale-down.
    pub auto_stop_timeout: Duration,
    /// Declared deployment environment variables.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}
