//! Diesel row models for provider registry persistence.

use super::schema::providers;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for provider records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = providers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProviderRow {
    /// Provider identifier.
    pub id: uuid::Uuid,
    /// Normalized source location string.
    pub source: String,
    /// Origin grouping string.
    pub origin: String,
    /// Registry manifest back-reference.
    pub registry: Option<String>,
    /// Idle window in seconds.
    pub auto_stop_timeout_secs: i64,
    /// Deployment environment variables JSON payload.
    pub variables: Value,
    /// Agent card JSON payload.
    pub agent_card: Value,
    /// Owning user.
    pub created_by: uuid::Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Last proxied-request timestamp.
    pub last_active_at: DateTime<Utc>,
}

/// Insert model for provider records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = providers)]
pub struct NewProviderRow {
    /// Provider identifier.
    pub id: uuid::Uuid,
    /// Normalized source location string.
    pub source: String,
    /// Origin grouping string.
    pub origin: String,
    /// Registry manifest back-reference.
    pub registry: Option<String>,
    /// Idle window in seconds.
    pub auto_stop_timeout_secs: i64,
    /// Deployment environment variables JSON payload.
    pub variables: Value,
    /// Agent card JSON payload.
    pub agent_card: Value,
    /// Owning user.
    pub created_by: uuid::Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Last proxied-request timestamp.
    pub last_active_at: DateTime<Utc>,
}
