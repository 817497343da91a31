//! Configuration for the Kubernetes deployment manager.

use crate::deployment::domain::ResourceLimits;
use crate::deployment::ports::{DeploymentError, DeploymentResult};
use std::time::Duration;
use url::Url;

/// Connection and workload settings for a Kubernetes cluster.
#[derive(Debug, Clone)]
pub struct KubernetesConfig {
    api_base: Url,
    namespace: String,
    bearer_token: Option<String>,
    service_port: u16,
    cluster_domain: String,
    limits: ResourceLimits,
    poll_interval: Duration,
}

impl KubernetesConfig {
    /// Creates a configuration for the given API server and namespace.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError::Api`] when the base URL cannot anchor
    /// relative API paths.
    pub fn new(api_base: &str, namespace: impl Into<String>) -> DeploymentResult<Self> {
        let trimmed = api_base.trim_end_matches('/');
        let base = Url::parse(&format!("{trimmed}/")).map_err(DeploymentError::api)?;
        Ok(Self {
            api_base: base,
            namespace: namespace.into(),
            bearer_token: None,
            service_port: 8000,
            cluster_domain: "cluster.local".to_owned(),
            limits: ResourceLimits::default(),
            poll_interval: Duration::from_millis(500),
        })
    }

    /// Sets the bearer token sent with every API request.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Sets the port exposed by provider services.
    #[must_use]
    pub const fn with_service_port(mut self, port: u16) -> Self {
        self.service_port = port;
        self
    }

    /// Sets the cluster DNS domain used for in-cluster URLs.
    #[must_use]
    pub fn with_cluster_domain(mut self, domain: impl Into<String>) -> Self {
        self.cluster_domain = domain.into();
        self
    }

    /// Sets container resource limits for provider workloads.
    #[must_use]
    pub const fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the startup-wait polling interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Returns the API base URL (always slash-terminated).
    #[must_use]
    pub const fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// Returns the target namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the configured bearer token, if any.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    /// Returns the provider service port.
    #[must_use]
    pub const fn service_port(&self) -> u16 {
        self.service_port
    }

    /// Returns the cluster DNS domain.
    #[must_use]
    pub fn cluster_domain(&self) -> &str {
        &self.cluster_domain
    }

    /// Returns the workload resource limits.
    #[must_use]
    pub const fn limits(&self) -> ResourceLimits {
        self.limits
    }

    /// Returns the startup-wait polling interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
