//! `PostgreSQL` repository implementation for the provider registry.

use super::{
    models::{NewProviderRow, ProviderRow},
    schema::providers,
};
use crate::provider::{
    domain::{
        AgentCard, PersistedProviderData, Provider, ProviderId, ProviderLocation, UserId,
    },
    ports::{ProviderRegistryError, ProviderRegistryRepository, ProviderRegistryResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::collections::BTreeMap;
use std::time::Duration;

/// `PostgreSQL` connection pool type used by provider registry adapters.
pub type ProviderPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed provider registry repository.
#[derive(Debug, Clone)]
pub struct PostgresProviderRegistry {
    pool: ProviderPgPool,
}

impl PostgresProviderRegistry {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: ProviderPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> ProviderRegistryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> ProviderRegistryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(ProviderRegistryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(ProviderRegistryError::persistence)?
    }
}

#[async_trait]
impl ProviderRegistryRepository for PostgresProviderRegistry {
    async fn create(&self, provider: &Provider) -> ProviderRegistryResult<()> {
        let source = provider.location().normalized();
        let new_row = to_new_row(provider)?;

        self.run_blocking(move |connection| {
            diesel::insert_into(providers::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        ProviderRegistryError::DuplicateSource {
                            normalized: source.clone(),
                        }
                    }
                    _ => ProviderRegistryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update(&self, provider: &Provider) -> ProviderRegistryResult<()> {
        let provider_id = provider.id().into_inner();
        let variables_val =
            serde_json::to_value(provider.variables()).map_err(ProviderRegistryError::persistence)?;
        let card_val = serde_json::to_value(provider.agent_card())
            .map_err(ProviderRegistryError::persistence)?;
        let registry_val = provider.registry().map(str::to_owned);
        let timeout_secs = timeout_to_secs(provider.auto_stop_timeout());
        let updated_val = provider.updated_at();
        let last_active_val = provider.last_active_at();

        self.run_blocking(move |connection| {
            let updated_count =
                diesel::update(providers::table.filter(providers::id.eq(provider_id)))
                    .set((
                        providers::registry.eq(&registry_val),
                        providers::auto_stop_timeout_secs.eq(timeout_secs),
                        providers::variables.eq(&variables_val),
                        providers::agent_card.eq(&card_val),
                        providers::updated_at.eq(updated_val),
                        providers::last_active_at.eq(last_active_val),
                    ))
                    .execute(connection)
                    .map_err(ProviderRegistryError::persistence)?;

            if updated_count == 0 {
                return Err(ProviderRegistryError::NotFound(ProviderId::from_uuid(
                    provider_id,
                )));
            }
            Ok(())
        })
        .await
    }

    async fn touch_last_active(
        &self,
        id: ProviderId,
        at: DateTime<Utc>,
    ) -> ProviderRegistryResult<()> {
        let provider_id = id.into_inner();
        self.run_blocking(move |connection| {
            let updated_count =
                diesel::update(providers::table.filter(providers::id.eq(provider_id)))
                    .set(providers::last_active_at.eq(at))
                    .execute(connection)
                    .map_err(ProviderRegistryError::persistence)?;
            if updated_count == 0 {
                return Err(ProviderRegistryError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: ProviderId) -> ProviderRegistryResult<Option<Provider>> {
        self.run_blocking(move |connection| {
            let row = providers::table
                .filter(providers::id.eq(id.into_inner()))
                .select(ProviderRow::as_select())
                .first::<ProviderRow>(connection)
                .optional()
                .map_err(ProviderRegistryError::persistence)?;
            row.map(row_to_provider).transpose()
        })
        .await
    }

    async fn find_by_source(
        &self,
        owner: UserId,
        normalized_source: &str,
    ) -> ProviderRegistryResult<Option<Provider>> {
        let source = normalized_source.to_owned();
        self.run_blocking(move |connection| {
            let row = providers::table
                .filter(providers::created_by.eq(owner.into_inner()))
                .filter(providers::source.eq(&source))
                .select(ProviderRow::as_select())
                .first::<ProviderRow>(connection)
                .optional()
                .map_err(ProviderRegistryError::persistence)?;
            row.map(row_to_provider).transpose()
        })
        .await
    }

    async fn list_all(&self) -> ProviderRegistryResult<Vec<Provider>> {
        self.run_blocking(move |connection| {
            let rows = providers::table
                .order(providers::created_at.asc())
                .select(ProviderRow::as_select())
                .load::<ProviderRow>(connection)
                .map_err(ProviderRegistryError::persistence)?;
            rows.into_iter().map(row_to_provider).collect()
        })
        .await
    }

    async fn list_by_origin(&self, origin: &str) -> ProviderRegistryResult<Vec<Provider>> {
        let origin_val = origin.to_owned();
        self.run_blocking(move |connection| {
            let rows = providers::table
                .filter(providers::origin.eq(&origin_val))
                .order(providers::created_at.asc())
                .select(ProviderRow::as_select())
                .load::<ProviderRow>(connection)
                .map_err(ProviderRegistryError::persistence)?;
            rows.into_iter().map(row_to_provider).collect()
        })
        .await
    }

    async fn delete(&self, id: ProviderId) -> ProviderRegistryResult<bool> {
        let provider_id = id.into_inner();
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(providers::table.filter(providers::id.eq(provider_id)))
                .execute(connection)
                .map_err(ProviderRegistryError::persistence)?;
            Ok(deleted > 0)
        })
        .await
    }
}

fn timeout_to_secs(timeout: Duration) -> i64 {
    i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX)
}

fn to_new_row(provider: &Provider) -> ProviderRegistryResult<NewProviderRow> {
    let variables =
        serde_json::to_value(provider.variables()).map_err(ProviderRegistryError::persistence)?;
    let agent_card =
        serde_json::to_value(provider.agent_card()).map_err(ProviderRegistryError::persistence)?;

    Ok(NewProviderRow {
        id: provider.id().into_inner(),
        source: provider.location().normalized(),
        origin: provider.origin().to_owned(),
        registry: provider.registry().map(str::to_owned),
        auto_stop_timeout_secs: timeout_to_secs(provider.auto_stop_timeout()),
        variables,
        agent_card,
        created_by: provider.created_by().into_inner(),
        created_at: provider.created_at(),
        updated_at: provider.updated_at(),
        last_active_at: provider.last_active_at(),
    })
}

fn row_to_provider(row: ProviderRow) -> ProviderRegistryResult<Provider> {
    let ProviderRow {
        id,
        source,
        origin,
        registry,
        auto_stop_timeout_secs,
        variables,
        agent_card,
        created_by,
        created_at,
        updated_at,
        last_active_at,
    } = row;

    let location = ProviderLocation::parse(&source)
        .map_err(ProviderRegistryError::invalid_persisted_data)?;
    let timeout_secs = u64::try_from(auto_stop_timeout_secs).map_err(|_| {
        ProviderRegistryError::invalid_persisted_data(std::io::Error::other(
            "negative auto_stop_timeout",
        ))
    })?;
    let parsed_variables: BTreeMap<String, String> = serde_json::from_value(variables)
        .map_err(ProviderRegistryError::invalid_persisted_data)?;
    let parsed_card: AgentCard = serde_json::from_value(agent_card)
        .map_err(ProviderRegistryError::invalid_persisted_data)?;

    let data = PersistedProviderData {
        id: ProviderId::from_uuid(id),
        location,
        origin,
        registry,
        auto_stop_timeout: Duration::from_secs(timeout_secs),
        variables: parsed_variables,
        agent_card: parsed_card,
        created_by: UserId::from_uuid(created_by),
        created_at,
        updated_at,
        last_active_at,
    };
    Ok(Provider::from_persisted(data))
}
