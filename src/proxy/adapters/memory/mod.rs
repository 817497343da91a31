//! In-memory adapters for proxy ports.

mod ownership;

pub use ownership::InMemoryOwnershipRepository;
