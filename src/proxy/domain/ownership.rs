//! Ownership records binding protocol request ids to users.

use super::{ContextId, TaskId};
use crate::provider::domain::{ProviderId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ownership record for a multi-turn A2A task.
///
/// A task id is bound to the first user who uses it; later requests
/// carrying the same id must come from the same user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOwnership {
    task_id: TaskId,
    user_id: UserId,
    provider_id: ProviderId,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
}

impl TaskOwnership {
    /// Creates a fresh ownership record at `now`.
    #[must_use]
    pub const fn new(
        task_id: TaskId,
        user_id: UserId,
        provider_id: ProviderId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            user_id,
            provider_id,
            created_at: now,
            last_accessed_at: now,
        }
    }

    /// Reconstructs a persisted record.
    #[must_use]
    pub const fn from_persisted(
        task_id: TaskId,
        user_id: UserId,
        provider_id: ProviderId,
        created_at: DateTime<Utc>,
        last_accessed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            user_id,
            provider_id,
            created_at,
            last_accessed_at,
        }
    }

    /// Returns the tracked task id.
    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Returns the owning user.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the provider the task was first routed to.
    #[must_use]
    pub const fn provider_id(&self) -> ProviderId {
        self.provider_id
    }

    /// Returns the record creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest access timestamp.
    #[must_use]
    pub const fn last_accessed_at(&self) -> DateTime<Utc> {
        self.last_accessed_at
    }

    /// Returns whether `user` owns this record.
    #[must_use]
    pub fn owned_by(&self, user: UserId) -> bool {
        self.user_id == user
    }

    /// Records an access at `now`.
    pub const fn touch(&mut self, now: DateTime<Utc>) {
        self.last_accessed_at = now;
    }
}

/// Ownership record for an A2A conversation context.
///
/// Contexts are grouping-only: unlike tasks, a context id supplied by a
/// client that has never been seen before is always claimable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextOwnership {
    context_id: ContextId,
    user_id: UserId,
    provider_id: ProviderId,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
}

impl ContextOwnership {
    /// Creates a fresh ownership record at `now`.
    #[must_use]
    pub const fn new(
        context_id: ContextId,
        user_id: UserId,
        provider_id: ProviderId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            context_id,
            user_id,
            provider_id,
            created_at: now,
            last_accessed_at: now,
        }
    }

    /// Reconstructs a persisted record.
    #[must_use]
    pub const fn from_persisted(
        context_id: ContextId,
        user_id: UserId,
        provider_id: ProviderId,
        created_at: DateTime<Utc>,
        last_accessed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            context_id,
            user_id,
            provider_id,
            created_at,
            last_accessed_at,
        }
    }

    /// Returns the tracked context id.
    #[must_use]
    pub const fn context_id(&self) -> &ContextId {
        &self.context_id
    }

    /// Returns the owning user.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the provider the context was first routed to.
    #[must_use]
    pub const fn provider_id(&self) -> ProviderId {
        self.provider_id
    }

    /// Returns the record creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest access timestamp.
    #[must_use]
    pub const fn last_accessed_at(&self) -> DateTime<Utc> {
        self.last_accessed_at
    }

    /// Returns whether `user` owns this record.
    #[must_use]
    pub fn owned_by(&self, user: UserId) -> bool {
        self.user_id == user
    }

    /// Records an access at `now`.
    pub const fn touch(&mut self, now: DateTime<Utc>) {
        self.last_accessed_at = now;
    }
}
