//! `PostgreSQL` repository implementation for request-id ownership.

use super::{
    models::{NewContextOwnershipRow, NewTaskOwnershipRow},
    schema::{a2a_request_contexts, a2a_request_tasks},
};
use crate::provider::domain::{ProviderId, UserId};
use crate::proxy::{
    domain::{ContextId, TaskId},
    ports::{OwnershipClaim, OwnershipError, OwnershipRepository, OwnershipResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};

/// `PostgreSQL` connection pool type used by ownership adapters.
pub type OwnershipPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed ownership repository.
///
/// Claims resolve races at the database: creation goes through
/// `ON CONFLICT DO NOTHING` on the id primary key, and continuation is a
/// single conditional `UPDATE` filtered on the owning user, so exactly
/// one of two racing users creates the record and the loser observes the
/// winner's ownership.
#[derive(Debug, Clone)]
pub struct PostgresOwnershipRepository {
    pool: OwnershipPgPool,
}

impl PostgresOwnershipRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: OwnershipPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> OwnershipResult<T>
    where
        F: FnOnce(&mut PgConnection) -> OwnershipResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(OwnershipError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(OwnershipError::persistence)?
    }
}

#[async_trait]
impl OwnershipRepository for PostgresOwnershipRepository {
    async fn claim_task(
        &self,
        task_id: &TaskId,
        user_id: UserId,
        provider_id: ProviderId,
        allow_creation: bool,
        now: DateTime<Utc>,
    ) -> OwnershipResult<OwnershipClaim> {
        let id = task_id.clone();
        self.run_blocking(move |connection| {
            if allow_creation {
                let new_row = NewTaskOwnershipRow {
                    task_id: id.as_str().to_owned(),
                    user_id: user_id.into_inner(),
                    provider_id: provider_id.into_inner(),
                    created_at: now,
                    last_accessed_at: now,
                };
                let inserted = diesel::insert_into(a2a_request_tasks::table)
                    .values(&new_row)
                    .on_conflict(a2a_request_tasks::task_id)
                    .do_nothing()
                    .execute(connection)
                    .map_err(OwnershipError::persistence)?;
                if inserted == 1 {
                    return Ok(OwnershipClaim::Created);
                }
            }

            // The id already exists (or creation is disallowed): touch the
            // record only when the caller owns it.
            let touched = diesel::update(
                a2a_request_tasks::table
                    .filter(a2a_request_tasks::task_id.eq(id.as_str()))
                    .filter(a2a_request_tasks::user_id.eq(user_id.into_inner())),
            )
            .set(a2a_request_tasks::last_accessed_at.eq(now))
            .execute(connection)
            .map_err(OwnershipError::persistence)?;
            if touched == 1 {
                return Ok(OwnershipClaim::Continued);
            }

            let exists = diesel::select(diesel::dsl::exists(
                a2a_request_tasks::table.filter(a2a_request_tasks::task_id.eq(id.as_str())),
            ))
            .get_result::<bool>(connection)
            .map_err(OwnershipError::persistence)?;
            if exists {
                Err(OwnershipError::TaskOwnedByAnotherUser(id))
            } else {
                Err(OwnershipError::TaskNotFound(id))
            }
        })
        .await
    }

    async fn claim_context(
        &self,
        context_id: &ContextId,
        user_id: UserId,
        provider_id: ProviderId,
        now: DateTime<Utc>,
    ) -> OwnershipResult<OwnershipClaim> {
        let id = context_id.clone();
        self.run_blocking(move |connection| {
            let new_row = NewContextOwnershipRow {
                context_id: id.as_str().to_owned(),
                user_id: user_id.into_inner(),
                provider_id: provider_id.into_inner(),
                created_at: now,
                last_accessed_at: now,
            };
            let inserted = diesel::insert_into(a2a_request_contexts::table)
                .values(&new_row)
                .on_conflict(a2a_request_contexts::context_id)
                .do_nothing()
                .execute(connection)
                .map_err(OwnershipError::persistence)?;
            if inserted == 1 {
                return Ok(OwnershipClaim::Created);
            }

            let touched = diesel::update(
                a2a_request_contexts::table
                    .filter(a2a_request_contexts::context_id.eq(id.as_str()))
                    .filter(a2a_request_contexts::user_id.eq(user_id.into_inner())),
            )
            .set(a2a_request_contexts::last_accessed_at.eq(now))
            .execute(connection)
            .map_err(OwnershipError::persistence)?;
            if touched == 1 {
                Ok(OwnershipClaim::Continued)
            } else {
                Err(OwnershipError::ContextOwnedByAnotherUser(id))
            }
        })
        .await
    }

    async fn delete_accessed_before(&self, cutoff: DateTime<Utc>) -> OwnershipResult<u64> {
        self.run_blocking(move |connection| {
            let tasks = diesel::delete(
                a2a_request_tasks::table.filter(a2a_request_tasks::last_accessed_at.lt(cutoff)),
            )
            .execute(connection)
            .map_err(OwnershipError::persistence)?;
            let contexts = diesel::delete(
                a2a_request_contexts::table
                    .filter(a2a_request_contexts::last_accessed_at.lt(cutoff)),
            )
            .execute(connection)
            .map_err(OwnershipError::persistence)?;
            Ok(u64::try_from(tasks + contexts).unwrap_or(u64::MAX))
        })
        .await
    }
}
