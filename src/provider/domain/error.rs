//! Error types for provider domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing provider domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderDomainError {
    /// The source location is empty after trimming.
    #[error("provider location must not be empty")]
    EmptyLocation,

    /// The container image reference could not be parsed.
    #[error("invalid image reference '{reference}': {reason}")]
    InvalidImageReference {
        /// The offending reference.
        reference: String,
        /// Why parsing failed.
        reason: String,
    },

    /// The network URL could not be parsed.
    #[error("invalid network url '{url}': {reason}")]
    InvalidNetworkUrl {
        /// The offending URL string.
        url: String,
        /// Why parsing failed.
        reason: String,
    },

    /// The network URL uses a scheme other than http or https.
    #[error("unsupported url scheme in '{url}' (only http and https are allowed)")]
    UnsupportedScheme {
        /// The offending URL string.
        url: String,
    },
}
