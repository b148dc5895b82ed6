// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time source for session stamps and liveness checks.
//!
//! Everything that stamps a record or measures staleness goes through
//! one `Clock`: `epoch_ms` feeds identifier generation, `timestamp`
//! feeds persisted records, and `now` feeds duration and stale-worker
//! math. Tests drive all three from a single fake.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A clock that provides the current time
pub trait Clock: Clone + Send + Sync {
    /// Monotonic instant, for durations and stale-worker sweeps.
    fn now(&self) -> Instant;

    /// Wall-clock milliseconds since the Unix epoch, for identifier
    /// suffixes.
    fn epoch_ms(&self) -> u64;

    /// Wall-clock timestamp for persisted records, derived from
    /// `epoch_ms` so records and identifiers can never disagree.
    fn timestamp(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.epoch_ms() as i64)
            .single()
            .unwrap_or_default()
    }
}

/// Real system clock
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

struct FakeState {
    started: Instant,
    elapsed: Duration,
    epoch_ms: u64,
}

/// Fake clock for testing with controllable time.
///
/// Monotonic and wall-clock time move together through `advance`;
/// `set_epoch_ms` repositions the wall clock alone, the way a real
/// clock might be stepped without touching monotonic time.
#[derive(Clone)]
pub struct FakeClock {
    state: Arc<Mutex<FakeState>>,
}

impl FakeClock {
    /// A fake clock positioned at an arbitrary but fixed wall time.
    pub fn new() -> Self {
        Self::at_epoch_ms(1_750_000_000_000)
    }

    /// A fake clock positioned at the given wall time.
    pub fn at_epoch_ms(epoch_ms: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                started: Instant::now(),
                elapsed: Duration::ZERO,
                epoch_ms,
            })),
        }
    }

    /// Advance both time bases by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.elapsed += duration;
        state.epoch_ms += duration.as_millis() as u64;
    }

    /// Step the wall clock without moving monotonic time.
    pub fn set_epoch_ms(&self, epoch_ms: u64) {
        self.state.lock().epoch_ms = epoch_ms;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        let state = self.state.lock();
        state.started + state.elapsed
    }

    fn epoch_ms(&self) -> u64 {
        self.state.lock().epoch_ms
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
