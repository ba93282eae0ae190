//! Time source for event timestamps.
//!
//! The router stamps `occurred_at` on every event it appends from an injected
//! [`Clock`], so tests can pin timestamps with a fixed clock.

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Source of the `occurred_at` timestamp attached to new events.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
