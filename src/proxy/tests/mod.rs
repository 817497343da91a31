//! Unit tests for the proxy module.
//!
//! Tests are organised by concern: request-id domain validation, ownership
//! claim semantics (including claim races), and the proxy service's
//! cold-start routing flow over the in-memory adapters.

mod service_tests;

use chrono::{DateTime, Local, Utc};
use mockable::Clock;

/// Clock pinned to a fixed instant, for deterministic retention tests.
pub(crate) struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}
