//! Daily reset detection.
//!
//! The reset must be edge-triggered (observe the hour crossing the reset
//! boundary) rather than level-triggered, so it cannot re-fire on every
//! poll during the reset hour. A per-calendar-date guard additionally
//! prevents a double fire if the clock jumps back and crosses the
//! boundary twice.

use time::{Date, OffsetDateTime};

use shiftline_core::BusinessDay;

/// The event produced when the reset boundary is crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetEvent {
    /// The business day that just began.
    pub new_day: BusinessDay,
}

/// Edge-triggered daily reset scheduler.
#[derive(Debug, Clone)]
pub struct ResetScheduler {
    reset_hour: u8,
    last_observed: Option<(Date, u8)>,
    last_fired: Option<Date>,
}

impl ResetScheduler {
    pub fn new(reset_hour: u8) -> Self {
        ResetScheduler {
            reset_hour,
            last_observed: None,
            last_fired: None,
        }
    }

    /// Observe the clock; fires at most once per calendar day, when the
    /// observed hour crosses the reset hour.
    pub fn check(&mut self, now: OffsetDateTime) -> Option<ResetEvent> {
        let date = now.date();
        let hour = now.hour();
        let crossed = match self.last_observed {
            None => {
                // Starting past the boundary: that date's edge is already
                // behind us, so a backwards clock jump must not replay it.
                if hour >= self.reset_hour {
                    self.last_fired = Some(date);
                }
                false
            }
            Some((prev_date, prev_hour)) => {
                (date == prev_date && prev_hour < self.reset_hour && hour >= self.reset_hour)
                    || (date > prev_date && hour >= self.reset_hour)
            }
        };
        self.last_observed = Some((date, hour));

        if crossed && self.last_fired != Some(date) {
            self.last_fired = Some(date);
            Some(ResetEvent {
                new_day: BusinessDay::from_instant(now, self.reset_hour),
            })
        } else {
            None
        }
    }
}
