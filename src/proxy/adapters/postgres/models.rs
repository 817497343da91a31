//! Diesel row models for request-id ownership persistence.

use super::schema::{a2a_request_contexts, a2a_request_tasks};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Insert model for task ownership records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = a2a_request_tasks)]
pub struct NewTaskOwnershipRow {
    /// Protocol task identifier.
    pub task_id: String,
    /// Owning user.
    pub user_id: uuid::Uuid,
    /// Provider the task was first routed to.
    pub provider_id: uuid::Uuid,
    /// Record creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest access timestamp.
    pub last_accessed_at: DateTime<Utc>,
}

/// Insert model for context ownership records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = a2a_request_contexts)]
pub struct NewContextOwnershipRow {
    /// Protocol context identifier.
    pub context_id: String,
    /// Owning user.
    pub user_id: uuid::Uuid,
    /// Provider the context was first routed to.
    pub provider_id: uuid::Uuid,
    /// Record creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest access timestamp.
    pub last_accessed_at: DateTime<Utc>,
}
