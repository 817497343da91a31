//! In-memory ownership repository for proxy tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::provider::domain::{ProviderId, UserId};
use crate::proxy::{
    domain::{ContextId, ContextOwnership, TaskId, TaskOwnership},
    ports::{OwnershipClaim, OwnershipError, OwnershipRepository, OwnershipResult},
};

#[derive(Debug, Default)]
struct OwnershipState {
    tasks: HashMap<TaskId, TaskOwnership>,
    contexts: HashMap<ContextId, ContextOwnership>,
}

/// Thread-safe in-memory ownership repository.
///
/// A single mutex serializes claims, which makes every claim atomic:
/// concurrent claims on the same unseen id resolve to one `Created` and
/// the rest observing the winner.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOwnershipRepository {
    state: Arc<Mutex<OwnershipState>>,
}

impl InMemoryOwnershipRepository {
    /// Creates an empty in-memory ownership repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> OwnershipResult<MutexGuard<'_, OwnershipState>> {
        self.state
            .lock()
            .map_err(|err| OwnershipError::persistence(std::io::Error::other(err.to_string())))
    }

    /// Returns the tracked task record, if any.
    #[must_use]
    pub fn task(&self, task_id: &TaskId) -> Option<TaskOwnership> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.tasks.get(task_id).cloned())
    }

    /// Returns the tracked context record, if any.
    #[must_use]
    pub fn context(&self, context_id: &ContextId) -> Option<ContextOwnership> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.contexts.get(context_id).cloned())
    }
}

#[async_trait]
impl OwnershipRepository for InMemoryOwnershipRepository {
    async fn claim_task(
        &self,
        task_id: &TaskId,
        user_id: UserId,
        provider_id: ProviderId,
        allow_creation: bool,
        now: DateTime<Utc>,
    ) -> OwnershipResult<OwnershipClaim> {
        let mut state = self.lock()?;
        if let Some(record) = state.tasks.get_mut(task_id) {
            if !record.owned_by(user_id) {
                return Err(OwnershipError::TaskOwnedByAnotherUser(task_id.clone()));
            }
            record.touch(now);
            return Ok(OwnershipClaim::Continued);
        }
        if !allow_creation {
            return Err(OwnershipError::TaskNotFound(task_id.clone()));
        }
        state.tasks.insert(
            task_id.clone(),
            TaskOwnership::new(task_id.clone(), user_id, provider_id, now),
        );
        Ok(OwnershipClaim::Created)
    }

    async fn claim_context(
        &self,
        context_id: &ContextId,
        user_id: UserId,
        provider_id: ProviderId,
        now: DateTime<Utc>,
    ) -> OwnershipResult<OwnershipClaim> {
        let mut state = self.lock()?;
        if let Some(record) = state.contexts.get_mut(context_id) {
            if !record.owned_by(user_id) {
                return Err(OwnershipError::ContextOwnedByAnotherUser(
                    context_id.clone(),
                ));
            }
            record.touch(now);
            return Ok(OwnershipClaim::Continued);
        }
        state.contexts.insert(
            context_id.clone(),
            ContextOwnership::new(context_id.clone(), user_id, provider_id, now),
        );
        Ok(OwnershipClaim::Created)
    }

    async fn delete_accessed_before(&self, cutoff: DateTime<Utc>) -> OwnershipResult<u64> {
        let mut state = self.lock()?;
        let before = state.tasks.len() + state.contexts.len();
        state
            .tasks
            .retain(|_, record| record.last_accessed_at() >= cutoff);
        state
            .contexts
            .retain(|_, record| record.last_accessed_at() >= cutoff);
        let after = state.tasks.len() + state.contexts.len();
        Ok(u64::try_from(before - after).unwrap_or(u64::MAX))
    }
}
