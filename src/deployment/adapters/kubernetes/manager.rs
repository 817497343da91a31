//! Kubernetes-backed deployment manager.
//!
//! Talks to the cluster's REST API directly: workloads are submitted with
//! server-side apply so concurrent `create_or_replace` calls for the same
//! provider converge on the apiserver instead of racing in this process.

use super::KubernetesConfig;
use crate::deployment::{
    domain::{
        DeploymentManifest, DeploymentObservation, DeploymentState, LogEvent, MANAGED_BY,
        workload_name,
    },
    ports::{DeploymentError, DeploymentManager, DeploymentResult},
};
use crate::provider::domain::{Provider, ProviderId, ProviderLocation};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use url::Url;

/// Deployment manager backed by the Kubernetes REST API.
#[derive(Debug, Clone)]
pub struct KubernetesDeploymentManager {
    http: reqwest::Client,
    config: KubernetesConfig,
}

impl KubernetesDeploymentManager {
    /// Creates a manager for the configured cluster.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError::Api`] when the HTTP client cannot be
    /// constructed (e.g. an invalid bearer token value).
    pub fn new(config: KubernetesConfig) -> DeploymentResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = config.bearer_token() {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(DeploymentError::api)?;
            headers.insert(AUTHORIZATION, value);
        }
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(DeploymentError::api)?;
        Ok(Self { http, config })
    }

    fn api_url(&self, path: &str) -> DeploymentResult<Url> {
        self.config
            .api_base()
            .join(path)
            .map_err(DeploymentError::api)
    }

    fn deployments_path(&self) -> String {
        format!(
            "apis/apps/v1/namespaces/{}/deployments",
            self.config.namespace()
        )
    }

    fn services_path(&self) -> String {
        format!("api/v1/namespaces/{}/services", self.config.namespace())
    }

    async fn apply(&self, url: Url, body: &Value) -> DeploymentResult<()> {
        let payload = serde_json::to_vec(body).map_err(DeploymentError::api)?;
        let response = self
            .http
            .patch(url)
            .query(&[("fieldManager", MANAGED_BY), ("force", "true")])
            .header(CONTENT_TYPE, "application/apply-patch+yaml")
            .body(payload)
            .send()
            .await
            .map_err(DeploymentError::api)?;
        response.error_for_status().map_err(DeploymentError::api)?;
        Ok(())
    }

    async fn get_deployment(&self, name: &str) -> DeploymentResult<Option<Value>> {
        let url = self.api_url(&format!("{}/{name}", self.deployments_path()))?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(DeploymentError::api)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let checked = response.error_for_status().map_err(DeploymentError::api)?;
        let body = checked.json::<Value>().await.map_err(DeploymentError::api)?;
        Ok(Some(body))
    }

    async fn delete_tolerant(&self, url: Url) -> DeploymentResult<()> {
        let response = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(DeploymentError::api)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        response.error_for_status().map_err(DeploymentError::api)?;
        Ok(())
    }

    async fn first_pod_name(&self, app_label: &str) -> DeploymentResult<Option<String>> {
        let url = self.api_url(&format!("api/v1/namespaces/{}/pods", self.config.namespace()))?;
        let response = self
            .http
            .get(url)
            .query(&[("labelSelector", format!("app={app_label}")), ("limit", "1".to_owned())])
            .send()
            .await
            .map_err(DeploymentError::api)?;
        let checked = response.error_for_status().map_err(DeploymentError::api)?;
        let body = checked.json::<Value>().await.map_err(DeploymentError::api)?;
        let name = body
            .get("items")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .and_then(|pod| pod.get("metadata"))
            .and_then(|metadata| metadata.get("name"))
            .and_then(Value::as_str)
            .map(str::to_owned);
        Ok(name)
    }

    async fn forward_log_stream(response: Response, sink: &mpsc::Sender<LogEvent>) {
        let mut buffer: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    buffer.extend_from_slice(&bytes);
                    while let Some(pos) = buffer.iter().position(|byte| *byte == b'\n') {
                        let tail = buffer.split_off(pos + 1);
                        let mut line_bytes = std::mem::replace(&mut buffer, tail);
                        line_bytes.pop();
                        if line_bytes.last() == Some(&b'\r') {
                            line_bytes.pop();
                        }
                        let line = String::from_utf8_lossy(&line_bytes).into_owned();
                        if sink.send(LogEvent::line(line)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    sink.send(LogEvent::error(err.to_string())).await.ok();
                    return;
                }
            }
        }
        if !buffer.is_empty() {
            let line = String::from_utf8_lossy(&buffer).into_owned();
            sink.send(LogEvent::line(line)).await.ok();
        }
    }
}

/// Container fields whose change triggers a pod-template rollout.
const ROLLOUT_FIELDS: [&str; 3] = [
    "/spec/template/spec/containers/0/image",
    "/spec/template/spec/containers/0/env",
    "/spec/template/spec/containers/0/resources",
];

fn prior_requires_rollout(prior: Option<&Value>, desired: &Value) -> bool {
    prior.is_none_or(|deployment| {
        let replicas = deployment
            .pointer("/spec/replicas")
            .and_then(Value::as_u64)
            .unwrap_or(1);
        replicas == 0
            || ROLLOUT_FIELDS
                .iter()
                .any(|path| deployment.pointer(path) != desired.pointer(path))
    })
}

fn condition_holds(deployment: &Value, kind: &str, status: &str) -> bool {
    deployment
        .pointer("/status/conditions")
        .and_then(Value::as_array)
        .is_some_and(|conditions| {
            conditions.iter().any(|condition| {
                condition.get("type").and_then(Value::as_str) == Some(kind)
                    && condition.get("status").and_then(Value::as_str) == Some(status)
            })
        })
}

fn observe(deployment: &Value) -> DeploymentObservation {
    let desired = deployment
        .pointer("/spec/replicas")
        .and_then(Value::as_u64)
        .unwrap_or(1);
    let ready = deployment
        .pointer("/status/readyReplicas")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    DeploymentObservation {
        desired_replicas: u32::try_from(desired).unwrap_or(u32::MAX),
        ready_replicas: u32::try_from(ready).unwrap_or(u32::MAX),
        available: condition_holds(deployment, "Available", "True"),
        progress_failed: condition_holds(deployment, "Progressing", "False"),
        replica_failure: condition_holds(deployment, "ReplicaFailure", "True"),
    }
}

#[async_trait]
impl DeploymentManager for KubernetesDeploymentManager {
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
        let manifest = DeploymentManifest::new(
            provider.id(),
            self.config.namespace(),
            image,
            env.clone(),
            self.config.service_port(),
            self.config.limits(),
        );

        // The prior object is read only to report whether this apply
        // changes anything; convergence itself is the apiserver's job.
        let desired = manifest.deployment();
        let prior = self.get_deployment(manifest.name()).await?;
        let changed = prior_requires_rollout(prior.as_ref(), &desired);

        let deployment_url =
            self.api_url(&format!("{}/{}", self.deployments_path(), manifest.name()))?;
        self.apply(deployment_url, &desired).await?;
        let service_url =
            self.api_url(&format!("{}/{}", self.services_path(), manifest.name()))?;
        self.apply(service_url, &manifest.service()).await?;

        info!(
            provider_id = %provider.id(),
            workload = manifest.name(),
            changed,
            "applied provider workload"
        );
        Ok(changed)
    }

    async fn state(&self, provider_ids: &[ProviderId]) -> DeploymentResult<Vec<DeploymentState>> {
        let url = self.api_url(&self.deployments_path())?;
        let response = self
            .http
            .get(url)
            .query(&[(
                "labelSelector",
                format!("app.kubernetes.io/managed-by={MANAGED_BY}"),
            )])
            .send()
            .await
            .map_err(DeploymentError::api)?;
        let checked = response.error_for_status().map_err(DeploymentError::api)?;
        let body = checked.json::<Value>().await.map_err(DeploymentError::api)?;

        let mut by_name: HashMap<String, DeploymentState> = HashMap::new();
        if let Some(items) = body.get("items").and_then(Value::as_array) {
            for deployment in items {
                if let Some(name) = deployment
                    .pointer("/metadata/name")
                    .and_then(Value::as_str)
                {
                    by_name.insert(name.to_owned(), observe(deployment).classify());
                }
            }
        }

        let states = provider_ids
            .iter()
            .map(|id| {
                by_name
                    .get(&workload_name(*id))
                    .copied()
                    .unwrap_or(DeploymentState::Missing)
            })
            .collect();
        debug!(providers = provider_ids.len(), "queried deployment states");
        Ok(states)
    }

    async fn delete(&self, provider_id: ProviderId) -> DeploymentResult<()> {
        let name = workload_name(provider_id);
        let deployment_url = self.api_url(&format!("{}/{name}", self.deployments_path()))?;
        self.delete_tolerant(deployment_url).await?;
        let service_url = self.api_url(&format!("{}/{name}", self.services_path()))?;
        self.delete_tolerant(service_url).await?;
        info!(provider_id = %provider_id, workload = name, "deleted provider workload");
        Ok(())
    }

    async fn scale_down(&self, provider_id: ProviderId) -> DeploymentResult<()> {
        let name = workload_name(provider_id);
        let url = self.api_url(&format!("{}/{name}/scale", self.deployments_path()))?;
        let response = self
            .http
            .patch(url)
            .header(CONTENT_TYPE, "application/merge-patch+json")
            .body(json!({"spec": {"replicas": 0}}).to_string())
            .send()
            .await
            .map_err(DeploymentError::api)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        response.error_for_status().map_err(DeploymentError::api)?;
        info!(provider_id = %provider_id, workload = name, "scaled provider to zero");
        Ok(())
    }

    fn provider_url(&self, provider_id: ProviderId) -> DeploymentResult<Url> {
        let name = workload_name(provider_id);
        let rendered = format!(
            "http://{name}.{}.svc.{}:{}",
            self.config.namespace(),
            self.config.cluster_domain(),
            self.config.service_port()
        );
        Url::parse(&rendered).map_err(DeploymentError::api)
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval()
    }

    async fn stream_logs(
        &self,
        provider_id: ProviderId,
        sink: mpsc::Sender<LogEvent>,
    ) -> DeploymentResult<()> {
        let name = workload_name(provider_id);
        let Some(pod) = self.first_pod_name(&name).await? else {
            sink.send(LogEvent::error("no pods exist for provider"))
                .await
                .ok();
            return Ok(());
        };

        let url = self.api_url(&format!(
            "api/v1/namespaces/{}/pods/{pod}/log",
            self.config.namespace()
        ))?;
        let response = self
            .http
            .get(url)
            .query(&[("follow", "true")])
            .send()
            .await
            .map_err(DeploymentError::api)?;
        match response.error_for_status() {
            Ok(stream_response) => {
                Self::forward_log_stream(stream_response, &sink).await;
            }
            Err(err) => {
                sink.send(LogEvent::error(err.to_string())).await.ok();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployment::domain::ResourceLimits;
    use rstest::rstest;

    fn desired_deployment(env: &[(&str, &str)]) -> Value {
        let provider_id = ProviderId::from_source("ghcr.io/acme/agent:1.2");
        let variables: BTreeMap<String, String> = env
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        DeploymentManifest::new(
            provider_id,
            "agents",
            "ghcr.io/acme/agent:1.2",
            variables,
            8000,
            ResourceLimits::default(),
        )
        .deployment()
    }

    fn with_field(mut deployment: Value, path: &str, value: Value) -> Value {
        if let Some(slot) = deployment.pointer_mut(path) {
            *slot = value;
        }
        deployment
    }

    #[rstest]
    fn missing_prior_requires_rollout() {
        let desired = desired_deployment(&[("API_KEY", "secret")]);

        assert!(prior_requires_rollout(None, &desired));
    }

    #[rstest]
    fn identical_prior_requires_no_rollout() {
        let desired = desired_deployment(&[("API_KEY", "secret")]);
        let prior = desired.clone();

        assert!(!prior_requires_rollout(Some(&prior), &desired));
    }

    #[rstest]
    fn scaled_to_zero_prior_requires_rollout() {
        let desired = desired_deployment(&[]);
        let prior = with_field(desired.clone(), "/spec/replicas", json!(0));

        assert!(prior_requires_rollout(Some(&prior), &desired));
    }

    #[rstest]
    #[case::image("/spec/template/spec/containers/0/image", json!("ghcr.io/acme/agent:1.3"))]
    #[case::env(
        "/spec/template/spec/containers/0/env",
        json!([{"name": "API_KEY", "value": "rotated"}])
    )]
    #[case::resources(
        "/spec/template/spec/containers/0/resources",
        json!({"limits": {"cpu": "500m", "memory": "1024Mi"}})
    )]
    fn changed_pod_template_field_requires_rollout(#[case] path: &str, #[case] value: Value) {
        let desired = desired_deployment(&[("API_KEY", "secret")]);
        let prior = with_field(desired.clone(), path, value);

        assert!(prior_requires_rollout(Some(&prior), &desired));
    }
}
