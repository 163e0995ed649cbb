//! Clock injection.
//!
//! Every read of "now" goes through a [`ClockSource`] handed to the
//! session at construction. Production uses [`SystemClock`]; tests and
//! the simulator use [`ManualClock`] to replay a 24-hour cycle in
//! milliseconds. There is no global time override.

use std::sync::{Arc, Mutex};

use time::{OffsetDateTime, UtcOffset};

/// Supplies the current instant.
pub trait ClockSource: Send + Sync + 'static {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock in the restaurant's UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub fn new(offset: UtcOffset) -> Self {
        SystemClock { offset }
    }
}

impl ClockSource for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }
}

/// A settable, steppable clock shared by cloning.
///
/// The test/demo double: `set` jumps to an arbitrary instant, `advance`
/// steps forward. Reads never assume monotonicity, so jumping backwards
/// is allowed (the reset scheduler guards double-fires itself).
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<OffsetDateTime>>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        ManualClock {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, instant: OffsetDateTime) {
        if let Ok(mut now) = self.now.lock() {
            *now = instant;
        }
    }

    pub fn advance(&self, duration: time::Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += duration;
        }
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> OffsetDateTime {
        self.now
            .lock()
            .map(|now| *now)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn manual_clock_steps_and_jumps() {
        let clock = ManualClock::new(datetime!(2024-03-01 10:00 UTC));
        let shared = clock.clone();
        clock.advance(time::Duration::minutes(15));
        assert_eq!(shared.now(), datetime!(2024-03-01 10:15 UTC));
        clock.set(datetime!(2024-03-02 02:00 UTC));
        assert_eq!(shared.now(), datetime!(2024-03-02 02:00 UTC));
    }
}
