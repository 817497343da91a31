//! Error types for deployment domain parsing.

use thiserror::Error;

/// Error returned while parsing a deployment state from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown deployment state: {0}")]
pub struct ParseDeploymentStateError(pub String);
