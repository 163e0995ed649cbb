//! Business-day identity.
//!
//! A restaurant's tracking day is bounded by the daily reset hour, not by
//! midnight: the closing period routinely runs past midnight, and those
//! tasks still belong to the day that opened them. Every completion record
//! and every missing-task computation is stamped with a [`BusinessDay`] so
//! that membership is an explicit key, never an hour-of-day comparison.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time};

/// Identity of one tracking day: the calendar date on which the day began.
///
/// An instant whose local hour is before the reset hour belongs to the
/// previous calendar date's business day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusinessDay(Date);

impl BusinessDay {
    /// The business day containing `now`, for a catalog resetting at
    /// `reset_hour` local time.
    pub fn from_instant(now: OffsetDateTime, reset_hour: u8) -> Self {
        if now.hour() < reset_hour {
            BusinessDay(now.date().previous_day().unwrap_or(now.date()))
        } else {
            BusinessDay(now.date())
        }
    }

    /// The calendar date on which this business day began.
    pub fn date(&self) -> Date {
        self.0
    }

    /// The following business day.
    pub fn next(&self) -> Self {
        BusinessDay(self.0.next_day().unwrap_or(self.0))
    }

    /// Anchor a wall-clock time to this business day, in the given offset.
    ///
    /// Times at or after the reset hour fall on the day's first calendar
    /// date; earlier times (the post-midnight tail of a closing shift)
    /// fall on the second.
    pub fn anchor(&self, tod: Time, reset_hour: u8, offset: time::UtcOffset) -> OffsetDateTime {
        let date = if tod.hour() < reset_hour {
            self.0.next_day().unwrap_or(self.0)
        } else {
            self.0
        };
        OffsetDateTime::new_in_offset(date, tod, offset)
    }
}

impl fmt::Display for BusinessDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn pre_reset_hours_belong_to_the_previous_day() {
        // 02:00 on March 2 is still the March 1 business day (reset 10:00).
        let now = datetime!(2024-03-02 02:00 UTC);
        let day = BusinessDay::from_instant(now, 10);
        assert_eq!(day.to_string(), "2024-03-01");

        let later = datetime!(2024-03-02 10:00 UTC);
        let day = BusinessDay::from_instant(later, 10);
        assert_eq!(day.to_string(), "2024-03-02");
    }

    #[test]
    fn anchor_splits_on_reset_hour() {
        let day = BusinessDay::from_instant(datetime!(2024-03-01 12:00 UTC), 10);
        let utc = time::UtcOffset::UTC;
        let evening = day.anchor(Time::from_hms(21, 30, 0).unwrap(), 10, utc);
        let small_hours = day.anchor(Time::from_hms(2, 0, 0).unwrap(), 10, utc);
        assert_eq!(evening.date(), datetime!(2024-03-01 00:00 UTC).date());
        assert_eq!(small_hours.date(), datetime!(2024-03-02 00:00 UTC).date());
        assert!(small_hours > evening);
    }

    #[test]
    fn serializes_as_a_plain_date_string() {
        let day = BusinessDay::from_instant(datetime!(2024-03-02 02:00 UTC), 10);
        let json = serde_json::to_string(&day).unwrap();
        assert_eq!(json, "\"2024-03-01\"");
        let back: BusinessDay = serde_json::from_str(&json).unwrap();
        assert_eq!(back, day);
    }
}
