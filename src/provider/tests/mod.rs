//! Unit tests for the provider module.
//!
//! Tests are organised by concern: domain normalization, identity, and
//! idle-expiry rules, then service orchestration flows over the in-memory
//! adapters.

mod domain_tests;
mod service_tests;

use chrono::{DateTime, Local, Utc};
use mockable::Clock;

/// Clock pinned to a fixed instant, for deterministic expiry tests.
pub(crate) struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}
