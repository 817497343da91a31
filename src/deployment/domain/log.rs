//! Typed events emitted on a provider log stream.

use serde::{Deserialize, Serialize};

/// One event forwarded to a log-stream consumer.
///
/// Infrastructure failures are delivered in-band as [`LogEvent::Error`]
/// rather than raised, so a consumer's stream is never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    /// One log line emitted by the provider workload.
    Line {
        /// Raw line content without the trailing newline.
        content: String,
    },
    /// The stream failed; no further lines will follow.
    Error {
        /// Human-readable failure description.
        message: String,
    },
}

impl LogEvent {
    /// Creates a line event.
    #[must_use]
    pub fn line(content: impl Into<String>) -> Self {
        Self::Line {
            content: content.into(),
        }
    }

    /// Creates an error event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
