//! In-memory deployment manager for orchestration-flow tests.

use crate::deployment::{
    domain::{DeploymentState, LogEvent},
    ports::{DeploymentError, DeploymentManager, DeploymentResult},
};
use crate::provider::domain::{Provider, ProviderId, ProviderLocation};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

/// One recorded call against the in-memory manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentCall {
    /// `create_or_replace` was invoked for the provider.
    CreateOrReplace(ProviderId),
    /// A batched state query was issued for the listed providers.
    State(Vec<ProviderId>),
    /// `delete` was invoked for the provider.
    Delete(ProviderId),
    /// `scale_down` was invoked for the provider.
    ScaleDown(ProviderId),
    /// `stream_logs` was invoked for the provider.
    StreamLogs(ProviderId),
}

#[derive(Debug, Clone)]
struct FakeWorkload {
    image: String,
    env: BTreeMap<String, String>,
    state: DeploymentState,
}

#[derive(Debug, Default)]
struct InMemoryDeploymentState {
    workloads: HashMap<ProviderId, FakeWorkload>,
    calls: Vec<DeploymentCall>,
    failing_scale_downs: HashSet<ProviderId>,
    held_startups: HashSet<ProviderId>,
    log_lines: HashMap<ProviderId, Vec<String>>,
}

/// In-memory deployment manager adapter.
///
/// Models the orchestration lifecycle without a cluster: workloads applied
/// via `create_or_replace` start in `Starting` and transition to `Running`
/// after a configurable delay, which exercises the cold-start wait path.
/// Every call is recorded for assertion.
#[derive(Debug, Clone)]
pub struct InMemoryDeploymentManager {
    state: Arc<RwLock<InMemoryDeploymentState>>,
    startup_delay: Duration,
    poll_interval: Duration,
}

impl Default for InMemoryDeploymentManager {
    fn default() -> Self {
        Self {
            state: Arc::new(RwLock::new(InMemoryDeploymentState::default())),
            startup_delay: Duration::from_millis(20),
            poll_interval: Duration::from_millis(5),
        }
    }
}

impl InMemoryDeploymentManager {
    /// Creates a manager with default timings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delay between apply and the `Running` transition.
    #[must_use]
    pub const fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    fn write(
        &self,
    ) -> DeploymentResult<std::sync::RwLockWriteGuard<'_, InMemoryDeploymentState>> {
        self.state
            .write()
            .map_err(|err| DeploymentError::api(std::io::Error::other(err.to_string())))
    }

    fn read(&self) -> DeploymentResult<std::sync::RwLockReadGuard<'_, InMemoryDeploymentState>> {
        self.state
            .read()
            .map_err(|err| DeploymentError::api(std::io::Error::other(err.to_string())))
    }

    /// Returns every call recorded so far, in order.
    ///
    /// # Errors
    ///
    /// Returns an API error when lock acquisition fails.
    pub fn calls(&self) -> DeploymentResult<Vec<DeploymentCall>> {
        Ok(self.read()?.calls.clone())
    }

    /// Forces a provider's workload into the given state.
    ///
    /// Creates a placeholder workload when none exists.
    ///
    /// # Errors
    ///
    /// Returns an API error when lock acquisition fails.
    pub fn set_state(
        &self,
        provider_id: ProviderId,
        state: DeploymentState,
    ) -> DeploymentResult<()> {
        let mut inner = self.write()?;
        inner
            .workloads
            .entry(provider_id)
            .or_insert_with(|| FakeWorkload {
                image: String::new(),
                env: BTreeMap::new(),
                state,
            })
            .state = state;
        Ok(())
    }

    /// Makes subsequent `scale_down` calls for the provider fail.
    ///
    /// # Errors
    ///
    /// Returns an API error when lock acquisition fails.
    pub fn fail_scale_down(&self, provider_id: ProviderId) -> DeploymentResult<()> {
        self.write()?.failing_scale_downs.insert(provider_id);
        Ok(())
    }

    /// Suppresses the automatic `Starting` → `Running` transition, leaving
    /// the workload starting forever (startup-timeout tests).
    ///
    /// # Errors
    ///
    /// Returns an API error when lock acquisition fails.
    pub fn hold_startup(&self, provider_id: ProviderId) -> DeploymentResult<()> {
        self.write()?.held_startups.insert(provider_id);
        Ok(())
    }

    /// Scripts the log lines returned by `stream_logs`.
    ///
    /// # Errors
    ///
    /// Returns an API error when lock acquisition fails.
    pub fn set_log_lines(
        &self,
        provider_id: ProviderId,
        lines: Vec<String>,
    ) -> DeploymentResult<()> {
        self.write()?.log_lines.insert(provider_id, lines);
        Ok(())
    }

    fn schedule_startup(&self, provider_id: ProviderId) {
        let shared = Arc::clone(&self.state);
        let delay = self.startup_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Ok(mut inner) = shared.write() {
                if inner.held_startups.contains(&provider_id) {
                    return;
                }
                if let Some(workload) = inner.workloads.get_mut(&provider_id)
                    && workload.state == DeploymentState::Starting
                {
                    workload.state = DeploymentState::Running;
                }
            }
        });
    }
}

#[async_trait]
impl DeploymentManager for InMemoryDeploymentManager {
    async fn create_or_replace(
        &self,
        provider: &Provider,
        env: &BTreeMap<String, String>,
    ) -> DeploymentResult<bool> {
        let image = match provider.location() {
            ProviderLocation::Image(image) => image.normalized(),
            ProviderLocation::Network(_) => {
                return Err(DeploymentError::NotManaged(provider.id()));
            }
        };

        let changed = {
            let mut inner = self.write()?;
            inner
                .calls
                .push(DeploymentCall::CreateOrReplace(provider.id()));
            let needs_apply = inner.workloads.get(&provider.id()).is_none_or(|workload| {
                workload.image != image
                    || workload.env != *env
                    || workload.state == DeploymentState::Stopped
            });
            if needs_apply {
                inner.workloads.insert(
                    provider.id(),
                    FakeWorkload {
                        image,
                        env: env.clone(),
                        state: DeploymentState::Starting,
                    },
                );
            }
            needs_apply
        };

        if changed {
            self.schedule_startup(provider.id());
        }
        Ok(changed)
    }

    async fn state(&self, provider_ids: &[ProviderId]) -> DeploymentResult<Vec<DeploymentState>> {
        let mut inner = self.write()?;
        inner.calls.push(DeploymentCall::State(provider_ids.to_vec()));
        Ok(provider_ids
            .iter()
            .map(|id| {
                inner
                    .workloads
                    .get(id)
                    .map_or(DeploymentState::Missing, |workload| workload.state)
            })
            .collect())
    }

    async fn delete(&self, provider_id: ProviderId) -> DeploymentResult<()> {
        let mut inner = self.write()?;
        inner.calls.push(DeploymentCall::Delete(provider_id));
        inner.workloads.remove(&provider_id);
        Ok(())
    }

    async fn scale_down(&self, provider_id: ProviderId) -> DeploymentResult<()> {
        let mut inner = self.write()?;
        inner.calls.push(DeploymentCall::ScaleDown(provider_id));
        if inner.failing_scale_downs.contains(&provider_id) {
            return Err(DeploymentError::api(std::io::Error::other(
                "injected scale-down failure",
            )));
        }
        if let Some(workload) = inner.workloads.get_mut(&provider_id) {
            workload.state = DeploymentState::Stopped;
        }
        Ok(())
    }

    fn provider_url(&self, provider_id: ProviderId) -> DeploymentResult<Url> {
        let name = crate::deployment::domain::workload_name(provider_id);
        Url::parse(&format!("http://{name}.aviary.test:8000"))
            .map_err(DeploymentError::api)
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    async fn stream_logs(
        &self,
        provider_id: ProviderId,
        sink: mpsc::Sender<LogEvent>,
    ) -> DeploymentResult<()> {
        let (exists, lines) = {
            let mut inner = self.write()?;
            inner.calls.push(DeploymentCall::StreamLogs(provider_id));
            (
                inner.workloads.contains_key(&provider_id),
                inner.log_lines.get(&provider_id).cloned().unwrap_or_default(),
            )
        };

        if !exists {
            sink.send(LogEvent::error("no workload exists for provider"))
                .await
                .ok();
            return Ok(());
        }
        for line in lines {
            if sink.send(LogEvent::line(line)).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}
