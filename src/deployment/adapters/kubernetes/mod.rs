//! Kubernetes adapter for the deployment manager port.

mod config;
mod manager;

pub use config::KubernetesConfig;
pub use manager::KubernetesDeploymentManager;
