//! Time and timestamp utilities

use std::time::Instant;

use chrono::{DateTime, Duration, Utc};

/// Wall-clock source that never goes backwards.
///
/// The wall time is read once at construction; every later reading is that
/// anchor plus the elapsed monotonic time, so a system clock step cannot make
/// processing stamps decrease within the process.
#[derive(Debug, Clone)]
pub struct ProcessingClock {
    wall_anchor: DateTime<Utc>,
    mono_anchor: Instant,
}

impl ProcessingClock {
    pub fn new() -> Self {
        Self {
            wall_anchor: Utc::now(),
            mono_anchor: Instant::now(),
        }
    }

    /// Anchor the clock at a fixed wall time (tests, replays)
    pub fn starting_at(wall_anchor: DateTime<Utc>) -> Self {
        Self {
            wall_anchor,
            mono_anchor: Instant::now(),
        }
    }

    /// Current processing instant
    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = Duration::from_std(self.mono_anchor.elapsed()).unwrap_or(Duration::MAX);
        self.wall_anchor
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for ProcessingClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Sorted-set score for an instant: epoch seconds with microsecond fraction
pub fn epoch_score(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}
