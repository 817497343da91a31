//! `PostgreSQL` adapter for request-id ownership persistence.

mod models;
mod repository;
mod schema;

pub use repository::{OwnershipPgPool, PostgresOwnershipRepository};
