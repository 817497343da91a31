//! `PostgreSQL` adapter for provider registry persistence.

mod models;
mod repository;
mod schema;

pub use repository::{PostgresProviderRegistry, ProviderPgPool};
