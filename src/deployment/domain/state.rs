//! Derived deployment lifecycle state.

use super::ParseDeploymentStateError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Live state of a provider's deployment.
///
/// Always derived from the orchestrator on demand, never persisted, so the
/// reported state cannot drift from the live one. `Stopped` is an explicit
/// state for scaled-to-zero deployments, distinct from `Missing` (no
/// deployment object) and `Starting` (replicas requested but not ready).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    /// No deployment object exists for the provider.
    Missing,
    /// The deployment exists with desired replicas scaled to zero.
    Stopped,
    /// Replicas are requested but not all of them report ready.
    Starting,
    /// All desired replicas report ready; availability not yet observed.
    Ready,
    /// All desired replicas are ready and the deployment is available.
    Running,
    /// The deployment reports a replica failure or a failed rollout.
    Error,
}

impl DeploymentState {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for DeploymentState {
    type Error = ParseDeploymentStateError;

    fn try_from(value: &str) -> Result<Self, ParseDeploymentStateError> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "missing" => Ok(Self::Missing),
            "stopped" => Ok(Self::Stopped),
            "starting" => Ok(Self::Starting),
            "ready" => Ok(Self::Ready),
            "running" => Ok(Self::Running),
            "error" => Ok(Self::Error),
            _ => Err(ParseDeploymentStateError(value.to_owned())),
        }
    }
}

/// Raw facts observed on a live deployment object.
///
/// Adapters fill this from whatever the orchestrator reports; the
/// classification into [`DeploymentState`] lives here so every adapter
/// agrees on the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeploymentObservation {
    /// Replica count requested by the deployment spec.
    pub desired_replicas: u32,
    /// Replica count currently reporting ready.
    pub ready_replicas: u32,
    /// Whether the deployment's availability condition holds.
    pub available: bool,
    /// Whether the rollout failed (progress deadline exceeded).
    pub progress_failed: bool,
    /// Whether the deployment reports a replica failure (e.g. crash loop).
    pub replica_failure: bool,
}

impl DeploymentObservation {
    /// Classifies the observation into a [`DeploymentState`].
    #[must_use]
    pub const fn classify(self) -> DeploymentState {
        if self.replica_failure || self.progress_failed {
            return DeploymentState::Error;
        }
        if self.desired_replicas == 0 {
            return DeploymentState::Stopped;
        }
        if self.ready_replicas < self.desired_replicas {
            return DeploymentState::Starting;
        }
        if self.available {
            DeploymentState::Running
        } else {
            DeploymentState::Ready
        }
    }
}
