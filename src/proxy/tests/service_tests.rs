//! Proxy service tests: ownership tracking and cold-start routing.

use super::FixedClock;
use crate::deployment::{
    adapters::memory::{DeploymentCall, InMemoryDeploymentManager},
    domain::DeploymentState,
    ports::{DeploymentError, DeploymentManager},
};
use crate::provider::{
    adapters::memory::InMemoryProviderRegistry,
    domain::{AgentCard, Provider, ProviderId, ProviderLocation, ProviderSpec, UserId},
    ports::ProviderRegistryRepository,
    services::ProviderService,
};
use crate::proxy::{
    adapters::memory::InMemoryOwnershipRepository,
    domain::{ContextId, TaskId},
    ports::{OwnershipError, OwnershipRepository},
    services::{A2AProxyError, A2AProxyService, RequestIds},
};
use chrono::{TimeDelta, Utc};
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

type TestProxy = A2AProxyService<
    InMemoryProviderRegistry,
    InMemoryDeploymentManager,
    InMemoryOwnershipRepository,
    DefaultClock,
>;

struct Harness {
    registry: Arc<InMemoryProviderRegistry>,
    deployments: Arc<InMemoryDeploymentManager>,
    ownership: Arc<InMemoryOwnershipRepository>,
    proxy: TestProxy,
}

#[fixture]
fn harness() -> Harness {
    let registry = Arc::new(InMemoryProviderRegistry::new());
    let deployments = Arc::new(InMemoryDeploymentManager::new());
    let ownership = Arc::new(InMemoryOwnershipRepository::new());
    let proxy = A2AProxyService::new(
        Arc::clone(&registry),
        Arc::clone(&deployments),
        Arc::clone(&ownership),
        Arc::new(DefaultClock),
    );
    Harness {
        registry,
        deployments,
        ownership,
        proxy,
    }
}

async fn seed_provider(harness: &Harness, raw_location: &str) -> Provider {
    let provider = Provider::new(
        ProviderSpec {
            location: ProviderLocation::parse(raw_location).expect("valid location"),
            origin: None,
            registry: None,
            auto_stop_timeout: Duration::ZERO,
            variables: BTreeMap::new(),
            agent_card: AgentCard::named("agent"),
            created_by: UserId::new(),
        },
        &FixedClock(Utc::now() - TimeDelta::minutes(10)),
    );
    harness
        .registry
        .create(&provider)
        .await
        .expect("seeding should succeed");
    provider
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_provider_is_rejected(harness: Harness) {
    let missing = ProviderId::from_source("docker.io/library/ghost:latest");

    let result = harness.proxy.get_proxy_client(missing).await;

    assert!(matches!(result, Err(A2AProxyError::ProviderNotFound(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn network_provider_bypasses_orchestration(harness: Harness) {
    let provider = seed_provider(&harness, "https://agents.example.com/echo/").await;

    let client = harness
        .proxy
        .get_proxy_client(provider.id())
        .await
        .expect("client resolution should succeed");

    assert_eq!(client.base_url().as_str(), "https://agents.example.com/echo/");
    let calls = harness.deployments.calls().expect("call log readable");
    assert!(calls.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cold_provider_is_woken_before_the_client_is_returned(harness: Harness) {
    let provider = seed_provider(&harness, "ghcr.io/acme/echo:1.0").await;

    let client = harness
        .proxy
        .get_proxy_client(provider.id())
        .await
        .expect("cold start should succeed");

    let states = harness
        .deployments
        .state(&[provider.id()])
        .await
        .expect("state query should succeed");
    assert_eq!(states.first().copied(), Some(DeploymentState::Running));
    assert!(client
        .base_url()
        .as_str()
        .contains(&format!("provider-{}", provider.id())));
    let calls = harness.deployments.calls().expect("call log readable");
    assert!(calls.contains(&DeploymentCall::CreateOrReplace(provider.id())));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn running_provider_skips_the_startup_wait(harness: Harness) {
    let provider = seed_provider(&harness, "ghcr.io/acme/echo:1.0").await;
    harness
        .deployments
        .create_or_replace(&provider, provider.variables())
        .await
        .expect("pre-apply should succeed");
    harness
        .deployments
        .wait_for_startup(provider.id(), Duration::from_secs(1))
        .await
        .expect("workload should start");
    let calls_before = harness
        .deployments
        .calls()
        .expect("call log readable")
        .len();

    harness
        .proxy
        .get_proxy_client(provider.id())
        .await
        .expect("client resolution should succeed");

    let calls = harness.deployments.calls().expect("call log readable");
    let new_calls: Vec<_> = calls.iter().skip(calls_before).cloned().collect();
    assert_eq!(
        new_calls,
        vec![
            DeploymentCall::State(vec![provider.id()]),
            DeploymentCall::CreateOrReplace(provider.id()),
        ]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failing_workload_fails_fast_without_reapplying(harness: Harness) {
    let provider = seed_provider(&harness, "ghcr.io/acme/broken:1.0").await;
    harness
        .deployments
        .set_state(provider.id(), DeploymentState::Error)
        .expect("state injection should succeed");

    let result = harness.proxy.get_proxy_client(provider.id()).await;

    assert!(matches!(
        result,
        Err(A2AProxyError::Deployment(DeploymentError::Failed { .. }))
    ));
    let calls = harness.deployments.calls().expect("call log readable");
    assert!(!calls.contains(&DeploymentCall::CreateOrReplace(provider.id())));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn startup_wait_is_bounded(harness: Harness) {
    let provider = seed_provider(&harness, "ghcr.io/acme/slow:1.0").await;
    harness
        .deployments
        .hold_startup(provider.id())
        .expect("hold should succeed");
    let proxy = A2AProxyService::new(
        Arc::clone(&harness.registry),
        Arc::clone(&harness.deployments),
        Arc::clone(&harness.ownership),
        Arc::new(DefaultClock),
    )
    .with_startup_timeout(Duration::from_millis(50));

    let result = proxy.get_proxy_client(provider.id()).await;

    assert!(matches!(
        result,
        Err(A2AProxyError::Deployment(
            DeploymentError::StartupTimeout { .. }
        ))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn every_proxy_resolution_bumps_last_active(harness: Harness) {
    let provider = seed_provider(&harness, "https://agents.example.com/echo").await;
    let seeded_activity = provider.last_active_at();

    harness
        .proxy
        .get_proxy_client(provider.id())
        .await
        .expect("client resolution should succeed");

    let stored = harness
        .registry
        .find_by_id(provider.id())
        .await
        .expect("lookup should succeed")
        .expect("provider should exist");
    assert!(stored.last_active_at() > seeded_activity);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tracking_claims_task_and_context_ids(harness: Harness) {
    let provider = seed_provider(&harness, "ghcr.io/acme/echo:1.0").await;
    let user = UserId::new();
    let ids = RequestIds {
        task_id: Some(TaskId::new("task-1").expect("valid id")),
        context_id: Some(ContextId::new("ctx-1").expect("valid id")),
        allow_task_creation: true,
    };

    harness
        .proxy
        .track_request_ids_ownership(user, provider.id(), &ids)
        .await
        .expect("tracking should succeed");

    let task = harness
        .ownership
        .task(&TaskId::new("task-1").expect("valid id"))
        .expect("task record should exist");
    assert!(task.owned_by(user));
    assert_eq!(task.provider_id(), provider.id());
    assert!(harness
        .ownership
        .context(&ContextId::new("ctx-1").expect("valid id"))
        .is_some());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tracking_rejects_client_continuation_of_unknown_task(harness: Harness) {
    let provider = seed_provider(&harness, "ghcr.io/acme/echo:1.0").await;
    let ids = RequestIds {
        task_id: Some(TaskId::new("task-unknown").expect("valid id")),
        context_id: None,
        allow_task_creation: false,
    };

    let result = harness
        .proxy
        .track_request_ids_ownership(UserId::new(), provider.id(), &ids)
        .await;

    assert!(matches!(
        result,
        Err(A2AProxyError::Ownership(OwnershipError::TaskNotFound(_)))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tracking_rejects_foreign_task_ids(harness: Harness) {
    let provider = seed_provider(&harness, "ghcr.io/acme/echo:1.0").await;
    let ids = RequestIds {
        task_id: Some(TaskId::new("task-1").expect("valid id")),
        context_id: None,
        allow_task_creation: true,
    };
    harness
        .proxy
        .track_request_ids_ownership(UserId::new(), provider.id(), &ids)
        .await
        .expect("first tracking should succeed");

    let result = harness
        .proxy
        .track_request_ids_ownership(UserId::new(), provider.id(), &ids)
        .await;

    assert!(matches!(
        result,
        Err(A2AProxyError::Ownership(
            OwnershipError::TaskOwnedByAnotherUser(_)
        ))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn purge_removes_records_outside_the_retention_window(harness: Harness) {
    let provider = seed_provider(&harness, "ghcr.io/acme/echo:1.0").await;
    let user = UserId::new();
    let stale = Utc::now() - TimeDelta::days(30);
    harness
        .ownership
        .claim_task(
            &TaskId::new("task-stale").expect("valid id"),
            user,
            provider.id(),
            true,
            stale,
        )
        .await
        .expect("claim should succeed");
    harness
        .ownership
        .claim_task(
            &TaskId::new("task-live").expect("valid id"),
            user,
            provider.id(),
            true,
            Utc::now(),
        )
        .await
        .expect("claim should succeed");

    let removed = harness
        .proxy
        .purge_ownership_records(Duration::from_secs(7 * 24 * 3600))
        .await
        .expect("purge should succeed");

    assert_eq!(removed, 1);
    assert!(harness
        .ownership
        .task(&TaskId::new("task-live").expect("valid id"))
        .is_some());
}
