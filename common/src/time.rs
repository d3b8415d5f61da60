//! Time utilities and the clock collaborator.

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::RwLock;

/// Registry timing constants.
pub mod constants {
    /// Default length of one rental day, in seconds.
    pub const DAY_UNIT_SECS: u64 = 86_400;
}

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Source of the current logical time.
///
/// Sampled once per registry operation.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<Timestamp>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Create a clock frozen at the given unix second.
    pub fn at_unix(secs: i64) -> Self {
        let start = Utc.timestamp_opt(secs, 0).single().unwrap_or_default();
        Self::new(start)
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now = *now + by;
    }

    /// Set the clock to an absolute time.
    pub fn set(&self, to: Timestamp) {
        *self.now.write() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.read()
    }
}

/// Number of whole `unit`s between `start` and `end`, rounded down.
///
/// Both the span and the unit are measured in whole milliseconds; any
/// sub-millisecond part is truncated. Returns 0 when `end <= start` or
/// `unit` is shorter than one millisecond.
pub fn whole_units_between(start: Timestamp, end: Timestamp, unit: Duration) -> u64 {
    let span = (end - start).num_milliseconds();
    let unit = unit.num_milliseconds();
    if span <= 0 || unit <= 0 {
        return 0;
    }
    (span / unit) as u64
}
