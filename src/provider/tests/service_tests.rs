//! Service orchestration tests for provider registration and lifecycle.

use super::FixedClock;
use crate::deployment::{
    adapters::memory::{DeploymentCall, InMemoryDeploymentManager},
    domain::{DeploymentState, LogEvent},
};
use crate::provider::{
    adapters::memory::{InMemoryAgentCardLoader, InMemoryProviderRegistry},
    domain::{AgentCard, Provider, ProviderLocation, ProviderSpec, RegistryEntry, UserId},
    ports::{ProviderRegistryError, ProviderRegistryRepository},
    services::{CreateProviderRequest, ProviderService, ProviderServiceError},
};
use chrono::{TimeDelta, Utc};
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

type TestService =
    ProviderService<InMemoryProviderRegistry, InMemoryDeploymentManager, InMemoryAgentCardLoader, DefaultClock>;

struct Harness {
    registry: Arc<InMemoryProviderRegistry>,
    deployments: Arc<InMemoryDeploymentManager>,
    cards: Arc<InMemoryAgentCardLoader>,
    service: TestService,
}

#[fixture]
fn harness() -> Harness {
    let registry = Arc::new(InMemoryProviderRegistry::new());
    let deployments = Arc::new(InMemoryDeploymentManager::new());
    let cards = Arc::new(InMemoryAgentCardLoader::new());
    let service = ProviderService::new(
        Arc::clone(&registry),
        Arc::clone(&deployments),
        Arc::clone(&cards),
        Arc::new(DefaultClock),
    );
    Harness {
        registry,
        deployments,
        cards,
        service,
    }
}

fn seed_card(harness: &Harness, raw_location: &str, name: &str) -> ProviderLocation {
    let location = ProviderLocation::parse(raw_location).expect("valid location");
    harness
        .cards
        .set_card(&location, AgentCard::named(name))
        .expect("seeding should succeed");
    location
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn create_provider_persists_with_loaded_card(harness: Harness) {
    let owner = UserId::new();
    seed_card(&harness, "ghcr.io/acme/echo:1.0", "echo");

    let created = harness
        .service
        .create_provider(CreateProviderRequest::new("ghcr.io/acme/echo:1.0", owner))
        .await
        .expect("registration should succeed");

    assert_eq!(created.provider().agent_card().name, "echo");
    assert_eq!(created.state(), DeploymentState::Missing);
    let stored = harness
        .registry
        .find_by_id(created.provider().id())
        .await
        .expect("lookup should succeed");
    assert_eq!(stored.as_ref(), Some(created.provider()));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn create_provider_accepts_prefetched_card_without_loader(harness: Harness) {
    let owner = UserId::new();

    let created = harness
        .service
        .create_provider(
            CreateProviderRequest::new("ghcr.io/acme/echo:1.0", owner)
                .with_agent_card(AgentCard::named("prefetched")),
        )
        .await
        .expect("registration should succeed without a seeded card");

    assert_eq!(created.provider().agent_card().name, "prefetched");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn prefetched_card_skips_the_loader_entirely() {
    let mut loader = crate::provider::ports::MockAgentCardLoader::new();
    loader.expect_load().times(0);
    let service = ProviderService::new(
        Arc::new(InMemoryProviderRegistry::new()),
        Arc::new(InMemoryDeploymentManager::new()),
        Arc::new(loader),
        Arc::new(DefaultClock),
    );

    service
        .create_provider(
            CreateProviderRequest::new("ghcr.io/acme/echo:1.0", UserId::new())
                .with_agent_card(AgentCard::named("prefetched")),
        )
        .await
        .expect("registration should succeed without touching the loader");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn create_provider_rejects_malformed_location(harness: Harness) {
    let result = harness
        .service
        .create_provider(CreateProviderRequest::new("   ", UserId::new()))
        .await;

    assert!(matches!(result, Err(ProviderServiceError::Manifest(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn create_provider_rejects_duplicate_source(harness: Harness) {
    let owner = UserId::new();
    seed_card(&harness, "ghcr.io/acme/echo:1.0", "echo");
    harness
        .service
        .create_provider(CreateProviderRequest::new("ghcr.io/acme/echo:1.0", owner))
        .await
        .expect("first registration should succeed");

    let result = harness
        .service
        .create_provider(CreateProviderRequest::new("ghcr.io/acme/echo:1.0", owner))
        .await;

    assert!(matches!(
        result,
        Err(ProviderServiceError::Repository(
            ProviderRegistryError::DuplicateSource { normalized }
        )) if normalized == "ghcr.io/acme/echo:1.0"
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn auto_remove_replaces_the_prior_registration(harness: Harness) {
    let owner = UserId::new();
    seed_card(&harness, "ghcr.io/acme/echo:1.0", "echo");
    let first = harness
        .service
        .create_provider(CreateProviderRequest::new("ghcr.io/acme/echo:1.0", owner))
        .await
        .expect("first registration should succeed");

    let replaced = harness
        .service
        .create_provider(
            CreateProviderRequest::new("ghcr.io/acme/echo:1.0", owner).with_auto_remove(true),
        )
        .await
        .expect("re-registration should succeed");

    assert_eq!(replaced.provider().id(), first.provider().id());
    let calls = harness.deployments.calls().expect("call log readable");
    assert!(calls.contains(&DeploymentCall::Delete(first.provider().id())));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn preview_provider_never_persists(harness: Harness) {
    seed_card(&harness, "ghcr.io/acme/echo:1.0", "echo");

    let preview = harness
        .service
        .preview_provider("ghcr.io/acme/echo:1.0", UserId::new(), None)
        .await
        .expect("preview should succeed");

    let stored = harness
        .registry
        .find_by_id(preview.provider().id())
        .await
        .expect("lookup should succeed");
    assert_eq!(stored, None);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn list_providers_uses_one_batched_state_query(harness: Harness) {
    let owner = UserId::new();
    seed_card(&harness, "ghcr.io/acme/echo:1.0", "echo");
    seed_card(&harness, "https://agents.example.com/remote", "remote");
    let managed = harness
        .service
        .create_provider(CreateProviderRequest::new("ghcr.io/acme/echo:1.0", owner))
        .await
        .expect("managed registration should succeed");
    harness
        .service
        .create_provider(CreateProviderRequest::new(
            "https://agents.example.com/remote",
            owner,
        ))
        .await
        .expect("network registration should succeed");
    let calls_before = harness
        .deployments
        .calls()
        .expect("call log readable")
        .len();

    let listed = harness
        .service
        .list_providers()
        .await
        .expect("listing should succeed");

    let calls = harness.deployments.calls().expect("call log readable");
    let state_queries: Vec<_> = calls
        .iter()
        .skip(calls_before)
        .filter(|call| matches!(call, DeploymentCall::State(_)))
        .collect();
    assert_eq!(state_queries.len(), 1);
    assert_eq!(
        state_queries.first(),
        Some(&&DeploymentCall::State(vec![managed.provider().id()]))
    );

    assert_eq!(listed.len(), 2);
    let network_entry = listed
        .iter()
        .find(|entry| !entry.provider().is_managed())
        .expect("network provider should be listed");
    assert_eq!(network_entry.state(), DeploymentState::Running);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn get_provider_reports_not_found(harness: Harness) {
    let missing = ProviderLocation::parse("ghcr.io/acme/ghost:1.0")
        .expect("valid location")
        .derive_id();

    let result = harness.service.get_provider(missing).await;

    assert!(matches!(result, Err(ProviderServiceError::NotFound(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn delete_provider_tears_down_managed_compute(harness: Harness) {
    let owner = UserId::new();
    seed_card(&harness, "ghcr.io/acme/echo:1.0", "echo");
    let created = harness
        .service
        .create_provider(CreateProviderRequest::new("ghcr.io/acme/echo:1.0", owner))
        .await
        .expect("registration should succeed");

    harness
        .service
        .delete_provider(created.provider().id())
        .await
        .expect("deletion should succeed");

    let calls = harness.deployments.calls().expect("call log readable");
    assert!(calls.contains(&DeploymentCall::Delete(created.provider().id())));
    let stored = harness
        .registry
        .find_by_id(created.provider().id())
        .await
        .expect("lookup should succeed");
    assert_eq!(stored, None);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn delete_network_provider_skips_orchestration(harness: Harness) {
    let owner = UserId::new();
    seed_card(&harness, "https://agents.example.com/remote", "remote");
    let created = harness
        .service
        .create_provider(CreateProviderRequest::new(
            "https://agents.example.com/remote",
            owner,
        ))
        .await
        .expect("registration should succeed");

    harness
        .service
        .delete_provider(created.provider().id())
        .await
        .expect("deletion should succeed");

    let calls = harness.deployments.calls().expect("call log readable");
    assert!(!calls.contains(&DeploymentCall::Delete(created.provider().id())));
}

/// Builds a provider whose `last_active_at` lies one hour in the past, so
/// any sub-hour idle window has expired.
fn stale_provider(raw_location: &str, timeout: Duration) -> Provider {
    let past = FixedClock(Utc::now() - TimeDelta::hours(1));
    Provider::new(
        ProviderSpec {
            location: ProviderLocation::parse(raw_location).expect("valid location"),
            origin: None,
            registry: None,
            auto_stop_timeout: timeout,
            variables: BTreeMap::new(),
            agent_card: AgentCard::named("stale"),
            created_by: UserId::new(),
        },
        &past,
    )
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn scale_down_sweep_stops_only_running_expired_providers(harness: Harness) {
    let expired = stale_provider("ghcr.io/acme/expired:1.0", Duration::from_secs(60));
    let fresh = stale_provider("ghcr.io/acme/fresh:1.0", Duration::ZERO);
    let stopped_already = stale_provider("ghcr.io/acme/stopped:1.0", Duration::from_secs(60));
    for provider in [&expired, &fresh, &stopped_already] {
        harness
            .registry
            .create(provider)
            .await
            .expect("seeding should succeed");
    }
    harness
        .deployments
        .set_state(expired.id(), DeploymentState::Running)
        .expect("state injection should succeed");
    harness
        .deployments
        .set_state(fresh.id(), DeploymentState::Running)
        .expect("state injection should succeed");
    harness
        .deployments
        .set_state(stopped_already.id(), DeploymentState::Stopped)
        .expect("state injection should succeed");

    let stopped = harness
        .service
        .scale_down_providers()
        .await
        .expect("sweep should succeed");

    assert_eq!(stopped, 1);
    let calls = harness.deployments.calls().expect("call log readable");
    assert!(calls.contains(&DeploymentCall::ScaleDown(expired.id())));
    assert!(!calls.contains(&DeploymentCall::ScaleDown(fresh.id())));
    assert!(!calls.contains(&DeploymentCall::ScaleDown(stopped_already.id())));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn scale_down_sweep_collects_failures_without_aborting(harness: Harness) {
    let providers: Vec<Provider> = ["a", "b", "c"]
        .iter()
        .map(|name| {
            stale_provider(
                &format!("ghcr.io/acme/{name}:1.0"),
                Duration::from_secs(60),
            )
        })
        .collect();
    for provider in &providers {
        harness
            .registry
            .create(provider)
            .await
            .expect("seeding should succeed");
        harness
            .deployments
            .set_state(provider.id(), DeploymentState::Running)
            .expect("state injection should succeed");
    }
    let failing_id = providers.get(1).expect("second provider").id();
    harness
        .deployments
        .fail_scale_down(failing_id)
        .expect("failure injection should succeed");

    let result = harness.service.scale_down_providers().await;

    let Err(ProviderServiceError::ScaleDownSweep(sweep)) = result else {
        panic!("sweep should report the aggregate failure");
    };
    assert_eq!(sweep.failures.len(), 1);
    assert_eq!(sweep.failures.first().map(|(id, _)| *id), Some(failing_id));
    let calls = harness.deployments.calls().expect("call log readable");
    let scale_downs = calls
        .iter()
        .filter(|call| matches!(call, DeploymentCall::ScaleDown(_)))
        .count();
    assert_eq!(scale_downs, 3);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reconcile_registry_creates_updates_and_removes(harness: Harness) {
    let owner = UserId::new();
    let origin = "fleet.example.com";
    seed_card(&harness, "ghcr.io/acme/kept:1.0", "kept");
    seed_card(&harness, "ghcr.io/acme/dropped:1.0", "dropped");
    seed_card(&harness, "ghcr.io/acme/new:1.0", "new");

    let initial = harness
        .service
        .reconcile_registry(
            origin,
            owner,
            &[
                RegistryEntry {
                    location: "ghcr.io/acme/kept:1.0".to_owned(),
                    auto_stop_timeout: Duration::from_secs(60),
                    variables: BTreeMap::new(),
                },
                RegistryEntry {
                    location: "ghcr.io/acme/dropped:1.0".to_owned(),
                    auto_stop_timeout: Duration::ZERO,
                    variables: BTreeMap::new(),
                },
            ],
        )
        .await
        .expect("initial reconciliation should succeed");
    assert_eq!(initial.created, 2);

    let outcome = harness
        .service
        .reconcile_registry(
            origin,
            owner,
            &[
                RegistryEntry {
                    location: "ghcr.io/acme/kept:1.0".to_owned(),
                    auto_stop_timeout: Duration::from_secs(300),
                    variables: BTreeMap::new(),
                },
                RegistryEntry {
                    location: "ghcr.io/acme/new:1.0".to_owned(),
                    auto_stop_timeout: Duration::ZERO,
                    variables: BTreeMap::new(),
                },
            ],
        )
        .await
        .expect("second reconciliation should succeed");

    assert_eq!(outcome.created, 1);
    assert_eq!(outcome.updated, 1);
    assert_eq!(outcome.removed, 1);

    let declared = harness
        .registry
        .list_by_origin(origin)
        .await
        .expect("listing should succeed");
    let sources: Vec<String> = declared
        .iter()
        .map(|provider| provider.location().normalized())
        .collect();
    assert_eq!(sources.len(), 2);
    assert!(sources.contains(&"ghcr.io/acme/kept:1.0".to_owned()));
    assert!(sources.contains(&"ghcr.io/acme/new:1.0".to_owned()));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reconcile_registry_collects_per_entry_failures(harness: Harness) {
    let owner = UserId::new();
    seed_card(&harness, "ghcr.io/acme/good:1.0", "good");

    let result = harness
        .service
        .reconcile_registry(
            "fleet.example.com",
            owner,
            &[
                RegistryEntry {
                    location: "ghcr.io/acme/good:1.0".to_owned(),
                    auto_stop_timeout: Duration::ZERO,
                    variables: BTreeMap::new(),
                },
                RegistryEntry {
                    // No card seeded: the load fails for this entry only.
                    location: "ghcr.io/acme/unreachable:1.0".to_owned(),
                    auto_stop_timeout: Duration::ZERO,
                    variables: BTreeMap::new(),
                },
            ],
        )
        .await;

    let Err(ProviderServiceError::Reconciliation(err)) = result else {
        panic!("reconciliation should report per-entry failures");
    };
    assert_eq!(err.failures.len(), 1);
    assert_eq!(
        err.failures.first().map(|failure| failure.location.as_str()),
        Some("ghcr.io/acme/unreachable:1.0")
    );
    let good = harness
        .registry
        .list_by_origin("fleet.example.com")
        .await
        .expect("listing should succeed");
    assert_eq!(good.len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stream_logs_rejects_network_providers(harness: Harness) {
    let owner = UserId::new();
    seed_card(&harness, "https://agents.example.com/remote", "remote");
    let created = harness
        .service
        .create_provider(CreateProviderRequest::new(
            "https://agents.example.com/remote",
            owner,
        ))
        .await
        .expect("registration should succeed");

    let (sink, _events) = mpsc::channel::<LogEvent>(1);
    let result = harness
        .service
        .stream_logs(created.provider().id(), sink)
        .await;

    assert!(matches!(result, Err(ProviderServiceError::NotManaged(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stream_logs_forwards_workload_output(harness: Harness) {
    let owner = UserId::new();
    seed_card(&harness, "ghcr.io/acme/echo:1.0", "echo");
    let created = harness
        .service
        .create_provider(CreateProviderRequest::new("ghcr.io/acme/echo:1.0", owner))
        .await
        .expect("registration should succeed");
    harness
        .deployments
        .set_state(created.provider().id(), DeploymentState::Running)
        .expect("state injection should succeed");
    harness
        .deployments
        .set_log_lines(created.provider().id(), vec!["booted".to_owned()])
        .expect("scripting should succeed");

    let (sink, mut events) = mpsc::channel(4);
    harness
        .service
        .stream_logs(created.provider().id(), sink)
        .await
        .expect("streaming should attach");

    assert_eq!(events.recv().await, Some(LogEvent::line("booted")));
}
