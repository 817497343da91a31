//! Error types for proxy domain validation.

use thiserror::Error;

/// Errors returned while validating protocol request identifiers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestIdError {
    /// The identifier is empty after trimming.
    #[error("{kind} id must not be empty")]
    Empty {
        /// Which identifier kind was rejected.
        kind: &'static str,
    },

    /// The identifier exceeds the accepted length.
    #[error("{kind} id is too long ({length} bytes)")]
    TooLong {
        /// Which identifier kind was rejected.
        kind: &'static str,
        /// Observed byte length.
        length: usize,
    },
}
