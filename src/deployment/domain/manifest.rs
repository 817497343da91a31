//! Declarative workload manifests for managed providers.

use crate::provider::domain::ProviderId;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Label and field-manager identity applied to every managed workload.
pub const MANAGED_BY: &str = "aviary";

/// Returns the workload object name for a provider.
#[must_use]
pub fn workload_name(provider_id: ProviderId) -> String {
    format!("provider-{provider_id}")
}

/// Container resource limits applied to provider workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    /// CPU limit in millicores.
    pub cpu_milli: u32,
    /// Memory limit in mebibytes.
    pub memory_mi: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu_milli: 1000,
            memory_mi: 1024,
        }
    }
}

/// Desired Deployment+Service pair for one managed provider.
///
/// Rendering is pure; the orchestrator adapter submits the rendered JSON
/// via declarative apply so concurrent submissions converge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentManifest {
    name: String,
    namespace: String,
    image: String,
    env: BTreeMap<String, String>,
    port: u16,
    replicas: u32,
    limits: ResourceLimits,
}

impl DeploymentManifest {
    /// Builds the manifest for a provider workload.
    #[must_use]
    pub fn new(
        provider_id: ProviderId,
        namespace: impl Into<String>,
        image: impl Into<String>,
        env: BTreeMap<String, String>,
        port: u16,
        limits: ResourceLimits,
    ) -> Self {
        Self {
            name: workload_name(provider_id),
            namespace: namespace.into(),
            image: image.into(),
            env,
            port,
            replicas: 1,
            limits,
        }
    }

    /// Returns the workload object name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the container image reference.
    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Returns the desired replica count.
    #[must_use]
    pub const fn replicas(&self) -> u32 {
        self.replicas
    }

    fn labels(&self) -> Value {
        json!({
            "app": self.name,
            "app.kubernetes.io/managed-by": MANAGED_BY,
        })
    }

    /// Renders the Deployment object.
    #[must_use]
    pub fn deployment(&self) -> Value {
        let env: Vec<Value> = self
            .env
            .iter()
            .map(|(name, value)| json!({"name": name, "value": value}))
            .collect();
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": self.name,
                "namespace": self.namespace,
                "labels": self.labels(),
            },
            "spec": {
                "replicas": self.replicas,
                "selector": {"matchLabels": {"app": self.name}},
                "template": {
                    "metadata": {"labels": self.labels()},
                    "spec": {
                        "containers": [{
                            "name": "agent",
                            "image": self.image,
                            "ports": [{"containerPort": self.port}],
                            "env": env,
                            "resources": {
                                "limits": {
                                    "cpu": format!("{}m", self.limits.cpu_milli),
                                    "memory": format!("{}Mi", self.limits.memory_mi),
                                },
                            },
                        }],
                    },
                },
            },
        })
    }

    /// Renders the Service object fronting the Deployment.
    #[must_use]
    pub fn service(&self) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {
                "name": self.name,
                "namespace": self.namespace,
                "labels": self.labels(),
            },
            "spec": {
                "selector": {"app": self.name},
                "ports": [{"port": self.port, "targetPort": self.port}],
            },
        })
    }
}
