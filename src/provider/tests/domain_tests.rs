//! Domain-focused tests for provider identity, locations, and expiry.

use super::FixedClock;
use crate::provider::domain::{
    AgentCard, AgentVariableDeclaration, Provider, ProviderDomainError, ProviderId,
    ProviderLocation, ProviderSpec, UserId,
};
use chrono::{TimeDelta, Utc};
use rstest::rstest;
use std::collections::BTreeMap;
use std::time::Duration;

fn provider_with_timeout(location: &str, timeout: Duration, clock: &FixedClock) -> Provider {
    Provider::new(
        ProviderSpec {
            location: ProviderLocation::parse(location).expect("valid location"),
            origin: None,
            registry: None,
            auto_stop_timeout: timeout,
            variables: BTreeMap::new(),
            agent_card: AgentCard::named("agent"),
            created_by: UserId::new(),
        },
        clock,
    )
}

#[rstest]
#[case::bare_repository("foo", "docker.io/library/foo:latest")]
#[case::bare_with_tag("foo:1.2", "docker.io/library/foo:1.2")]
#[case::namespaced("acme/agent", "docker.io/acme/agent:latest")]
#[case::custom_registry("ghcr.io/acme/agent", "ghcr.io/acme/agent:latest")]
#[case::registry_with_port("localhost:5000/app:dev", "localhost:5000/app:dev")]
#[case::surrounding_whitespace("  foo  ", "docker.io/library/foo:latest")]
fn image_references_normalize_to_canonical_form(#[case] raw: &str, #[case] expected: &str) {
    let location = ProviderLocation::parse(raw).expect("reference should parse");
    assert_eq!(location.normalized(), expected);
    assert!(location.is_managed());
}

#[rstest]
#[case::trailing_slash("https://agents.example.com/echo/", "https://agents.example.com/echo")]
#[case::plain("http://10.0.0.5:8000", "http://10.0.0.5:8000")]
fn network_urls_normalize_without_trailing_slash(#[case] raw: &str, #[case] expected: &str) {
    let location = ProviderLocation::parse(raw).expect("url should parse");
    assert_eq!(location.normalized(), expected);
    assert!(!location.is_managed());
}

#[rstest]
fn empty_location_is_rejected() {
    assert_eq!(
        ProviderLocation::parse("   "),
        Err(ProviderDomainError::EmptyLocation)
    );
}

#[rstest]
fn uppercase_repository_is_rejected() {
    let result = ProviderLocation::parse("ghcr.io/Acme/Agent");
    assert!(matches!(
        result,
        Err(ProviderDomainError::InvalidImageReference { .. })
    ));
}

#[rstest]
fn non_http_scheme_is_rejected_for_network_endpoints() {
    let result = crate::provider::domain::NetworkLocation::parse("ftp://agents.example.com/echo");
    assert!(matches!(
        result,
        Err(ProviderDomainError::UnsupportedScheme { .. })
    ));
}

#[rstest]
fn equivalent_spellings_derive_the_same_id() {
    let bare = ProviderLocation::parse("foo").expect("valid reference");
    let explicit =
        ProviderLocation::parse("docker.io/library/foo:latest").expect("valid reference");

    assert_eq!(bare.derive_id(), explicit.derive_id());
}

#[rstest]
fn distinct_sources_derive_distinct_ids() {
    let one = ProviderId::from_source("docker.io/library/foo:latest");
    let other = ProviderId::from_source("docker.io/library/foo:1.0");

    assert_ne!(one, other);
}

#[rstest]
fn default_origin_groups_by_registry_or_host() {
    let image = ProviderLocation::parse("ghcr.io/acme/agent").expect("valid reference");
    let network =
        ProviderLocation::parse("https://agents.example.com/echo").expect("valid endpoint");

    assert_eq!(image.default_origin(), "ghcr.io");
    assert_eq!(network.default_origin(), "agents.example.com");
}

#[rstest]
fn new_provider_derives_id_and_aligns_timestamps() {
    let clock = FixedClock(Utc::now());
    let provider = provider_with_timeout("ghcr.io/acme/agent:1.0", Duration::ZERO, &clock);

    assert_eq!(provider.id(), provider.location().derive_id());
    assert_eq!(provider.created_at(), provider.updated_at());
    assert_eq!(provider.created_at(), provider.last_active_at());
    assert_eq!(provider.origin(), "ghcr.io");
}

#[rstest]
fn idle_expiry_triggers_only_past_the_window() {
    let clock = FixedClock(Utc::now());
    let provider =
        provider_with_timeout("ghcr.io/acme/agent:1.0", Duration::from_secs(60), &clock);
    let deadline = provider.last_active_at() + TimeDelta::seconds(60);

    assert!(!provider.idle_expired(deadline - TimeDelta::seconds(1)));
    assert!(!provider.idle_expired(deadline));
    assert!(provider.idle_expired(deadline + TimeDelta::seconds(1)));
}

#[rstest]
fn zero_timeout_disables_idle_expiry() {
    let clock = FixedClock(Utc::now());
    let provider = provider_with_timeout("ghcr.io/acme/agent:1.0", Duration::ZERO, &clock);

    assert!(!provider.idle_expired(provider.last_active_at() + TimeDelta::days(365)));
}

#[rstest]
fn unmanaged_providers_never_idle_expire() {
    let clock = FixedClock(Utc::now());
    let provider = provider_with_timeout(
        "https://agents.example.com/echo",
        Duration::from_secs(1),
        &clock,
    );

    assert!(!provider.idle_expired(provider.last_active_at() + TimeDelta::days(365)));
}

#[rstest]
fn mark_active_resets_the_idle_window() {
    let base = Utc::now();
    let clock = FixedClock(base);
    let mut provider =
        provider_with_timeout("ghcr.io/acme/agent:1.0", Duration::from_secs(60), &clock);

    let later = FixedClock(base + TimeDelta::seconds(120));
    provider.mark_active(&later);

    assert!(!provider.idle_expired(base + TimeDelta::seconds(119)));
    assert_eq!(provider.last_active_at(), base + TimeDelta::seconds(120));
}

#[rstest]
fn reconfigure_replaces_declared_fields_and_bumps_updated_at() {
    let base = Utc::now();
    let mut provider = provider_with_timeout(
        "ghcr.io/acme/agent:1.0",
        Duration::from_secs(60),
        &FixedClock(base),
    );
    let mut variables = BTreeMap::new();
    variables.insert("MODEL".to_owned(), "large".to_owned());

    provider.reconfigure(
        Duration::from_secs(300),
        variables.clone(),
        &FixedClock(base + TimeDelta::seconds(5)),
    );

    assert_eq!(provider.auto_stop_timeout(), Duration::from_secs(300));
    assert_eq!(provider.variables(), &variables);
    assert_eq!(provider.updated_at(), base + TimeDelta::seconds(5));
    assert_eq!(provider.created_at(), base);
}

#[rstest]
fn agent_card_reports_required_variables_only() {
    let mut card = AgentCard::named("agent");
    card.variables = vec![
        AgentVariableDeclaration {
            name: "API_KEY".to_owned(),
            description: None,
            required: true,
        },
        AgentVariableDeclaration {
            name: "LOG_LEVEL".to_owned(),
            description: Some("optional verbosity".to_owned()),
            required: false,
        },
    ];

    assert_eq!(card.required_variables(), vec!["API_KEY"]);
}

#[rstest]
fn provider_round_trips_through_serde() {
    let provider = provider_with_timeout(
        "ghcr.io/acme/agent:1.0",
        Duration::from_secs(60),
        &FixedClock(Utc::now()),
    );

    let rendered = serde_json::to_string(&provider).expect("provider should serialize");
    let parsed: Provider = serde_json::from_str(&rendered).expect("provider should deserialize");

    assert_eq!(parsed, provider);
}

#[rstest]
fn network_location_round_trips_through_serde() {
    let location =
        ProviderLocation::parse("https://agents.example.com/echo").expect("valid endpoint");

    let rendered = serde_json::to_string(&location).expect("location should serialize");
    let parsed: ProviderLocation =
        serde_json::from_str(&rendered).expect("location should deserialize");

    assert!(rendered.contains("https://agents.example.com/echo"));
    assert_eq!(parsed, location);
}
