//! Protocol request identifiers tracked for ownership.

use super::RequestIdError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum accepted length for protocol-supplied identifiers.
const MAX_REQUEST_ID_LEN: usize = 256;

fn validate(kind: &'static str, raw: &str) -> Result<String, RequestIdError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RequestIdError::Empty { kind });
    }
    if trimmed.len() > MAX_REQUEST_ID_LEN {
        return Err(RequestIdError::TooLong {
            kind,
            length: trimmed.len(),
        });
    }
    Ok(trimmed.to_owned())
}

/// Identifier of a multi-turn A2A task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Validates and wraps a protocol-supplied task id.
    ///
    /// # Errors
    ///
    /// Returns [`RequestIdError`] when the id is empty or oversized.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, RequestIdError> {
        Ok(Self(validate("task", raw.as_ref())?))
    }

    /// Returns the wrapped id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an A2A conversation context (grouping only).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(String);

impl ContextId {
    /// Validates and wraps a protocol-supplied context id.
    ///
    /// # Errors
    ///
    /// Returns [`RequestIdError`] when the id is empty or oversized.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, RequestIdError> {
        Ok(Self(validate("context", raw.as_ref())?))
    }

    /// Returns the wrapped id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
