//! Repository port for request-id ownership tracking.

use crate::proxy::domain::{ContextId, TaskId};
use crate::provider::domain::{ProviderId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for ownership repository operations.
pub type OwnershipResult<T> = Result<T, OwnershipError>;

/// Outcome of a successful ownership claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipClaim {
    /// A new ownership record was created for the caller.
    Created,
    /// An existing record owned by the caller was refreshed.
    Continued,
}

/// Persistence contract for binding protocol request ids to users.
///
/// Claims must be atomic under concurrency: when two users race on the
/// same previously unseen id, exactly one claim creates the record and
/// the other observes the winner's ownership.
#[async_trait]
pub trait OwnershipRepository: Send + Sync {
    /// Claims a task id for `user_id`, creating or refreshing the record.
    ///
    /// `allow_creation` distinguishes server-minted ids (the upstream
    /// response introduced the id, so a missing record is created) from
    /// client-supplied ids (the client is continuing a task, so a missing
    /// record is an error).
    ///
    /// # Errors
    ///
    /// Returns [`OwnershipError::TaskNotFound`] when `allow_creation` is
    /// false and no record exists, and
    /// [`OwnershipError::TaskOwnedByAnotherUser`] when the record belongs
    /// to a different user.
    async fn claim_task(
        &self,
        task_id: &TaskId,
        user_id: UserId,
        provider_id: ProviderId,
        allow_creation: bool,
        now: DateTime<Utc>,
    ) -> OwnershipResult<OwnershipClaim>;

    /// Claims a context id for `user_id`, creating or refreshing the
    /// record. Unseen context ids are always claimable.
    ///
    /// # Errors
    ///
    /// Returns [`OwnershipError::ContextOwnedByAnotherUser`] when the
    /// record belongs to a different user.
    async fn claim_context(
        &self,
        context_id: &ContextId,
        user_id: UserId,
        provider_id: ProviderId,
        now: DateTime<Utc>,
    ) -> OwnershipResult<OwnershipClaim>;

    /// Deletes task and context records not accessed since `cutoff`;
    /// returns how many records were removed.
    async fn delete_accessed_before(&self, cutoff: DateTime<Utc>) -> OwnershipResult<u64>;
}

/// Errors returned by ownership repository implementations.
#[derive(Debug, Clone, Error)]
pub enum OwnershipError {
    /// A client continued a task id that was never tracked.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The task id belongs to a different user.
    #[error("task {0} is owned by another user")]
    TaskOwnedByAnotherUser(TaskId),

    /// The context id belongs to a different user.
    #[error("context {0} is owned by another user")]
    ContextOwnedByAnotherUser(ContextId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl OwnershipError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
