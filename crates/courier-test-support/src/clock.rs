//! Deterministic `Clock` for tests.

use chrono::{DateTime, TimeZone, Utc};
use courier_core::clock::Clock;

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Midnight UTC on 2026-01-01.
    #[must_use]
    pub fn epoch() -> Self {
        Self(
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
