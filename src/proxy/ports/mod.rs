//! Port contracts for A2A request proxying.

mod ownership;

pub use ownership::{OwnershipClaim, OwnershipError, OwnershipRepository, OwnershipResult};
