//! Deployment manager port: translates providers into running compute.

use crate::deployment::domain::{DeploymentState, LogEvent};
use crate::provider::domain::{Provider, ProviderId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

/// Result type for deployment manager operations.
pub type DeploymentResult<T> = Result<T, DeploymentError>;

/// Orchestration contract for managed provider workloads.
///
/// Implementations must make `create_or_replace` safe under concurrent
/// calls for the same provider: it reconciles declaratively to one end
/// state instead of check-then-create.
#[async_trait]
pub trait DeploymentManager: Send + Sync {
    /// Idempotently ensures a workload matching the provider exists.
    ///
    /// Returns whether anything changed, so callers can decide whether a
    /// rollout wait is needed.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError::NotManaged`] for network-backed providers
    /// and orchestrator failures otherwise.
    async fn create_or_replace(
        &self,
        provider: &Provider,
        env: &BTreeMap<String, String>,
    ) -> DeploymentResult<bool>;

    /// Reports live state for each provider, in input order.
    ///
    /// Providers without a deployment yield [`DeploymentState::Missing`];
    /// a single absent workload never fails the batch.
    ///
    /// # Errors
    ///
    /// Returns orchestrator API failures only.
    async fn state(&self, provider_ids: &[ProviderId]) -> DeploymentResult<Vec<DeploymentState>>;

    /// Removes the provider's workload; tolerant of already-deleted.
    ///
    /// # Errors
    ///
    /// Returns orchestrator API failures only.
    async fn delete(&self, provider_id: ProviderId) -> DeploymentResult<()>;

    /// Scales the workload to zero replicas, keeping its definition.
    ///
    /// # Errors
    ///
    /// Returns orchestrator API failures only.
    async fn scale_down(&self, provider_id: ProviderId) -> DeploymentResult<()>;

    /// Resolves the in-cluster URL for the provider's service. No I/O.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError::Api`] when the configured naming scheme
    /// produces an unparsable URL.
    fn provider_url(&self, provider_id: ProviderId) -> DeploymentResult<Url>;

    /// Attaches to the workload's log stream and forwards events to the
    /// sink until cancelled or the stream ends.
    ///
    /// Stream failures are forwarded as [`LogEvent::Error`] events; a
    /// closed sink ends forwarding without error.
    ///
    /// # Errors
    ///
    /// Returns orchestrator API failures encountered before the stream is
    /// attached.
    async fn stream_logs(
        &self,
        provider_id: ProviderId,
        sink: mpsc::Sender<LogEvent>,
    ) -> DeploymentResult<()>;

    /// Interval between state polls in [`DeploymentManager::wait_for_startup`].
    fn poll_interval(&self) -> Duration {
        Duration::from_millis(500)
    }

    /// Polls until the provider reports [`DeploymentState::Running`].
    ///
    /// The wait is bounded by `timeout` and cancellable by dropping the
    /// returned future; no watch resources outlive it.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError::StartupTimeout`] when the bound elapses,
    /// [`DeploymentError::Failed`] when the workload enters the error
    /// state, or orchestrator failures from polling.
    async fn wait_for_startup(
        &self,
        provider_id: ProviderId,
        timeout: Duration,
    ) -> DeploymentResult<()> {
        let poll = async {
            loop {
                let states = self.state(std::slice::from_ref(&provider_id)).await?;
                let current = states.first().copied().unwrap_or(DeploymentState::Missing);
                match current {
                    DeploymentState::Running => return Ok(()),
                    DeploymentState::Error => {
                        return Err(DeploymentError::Failed { provider_id });
                    }
                    _ => tokio::time::sleep(self.poll_interval()).await,
                }
            }
        };
        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(DeploymentError::StartupTimeout {
                provider_id,
                waited: timeout,
            }),
        }
    }
}

/// Errors returned by deployment manager implementations.
#[derive(Debug, Clone, Error)]
pub enum DeploymentError {
    /// The provider is network-backed and has no managed compute.
    #[error("provider {0} is not managed by the orchestrator")]
    NotManaged(ProviderId),

    /// The workload did not reach running state within the bound.
    #[error("provider {provider_id} did not start within {waited:?}")]
    StartupTimeout {
        /// Provider whose startup timed out.
        provider_id: ProviderId,
        /// The bound that elapsed.
        waited: Duration,
    },

    /// The workload entered the error state; human intervention needed.
    #[error("provider {provider_id} deployment is failing and will not be retried")]
    Failed {
        /// Provider whose deployment failed.
        provider_id: ProviderId,
    },

    /// Orchestrator API failure.
    #[error("orchestrator api error: {0}")]
    Api(Arc<dyn std::error::Error + Send + Sync>),
}

impl DeploymentError {
    /// Wraps an orchestrator API error.
    pub fn api(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Api(Arc::new(err))
    }
}
