//! Time-based period resolution.
//!
//! `resolve` is a pure function of the catalog and `now`: no hidden
//! state, identical outputs for identical inputs. Period windows are
//! anchored to the business day (a boundary earlier than the reset hour
//! lands on the day's second calendar date), which handles cross-midnight
//! periods and keeps yesterday's closing tasks out of today's scans
//! without any hour-of-day heuristics.
//!
//! Event-driven periods are never `current` by time alone; entering them
//! takes an operator trigger (or configured fallback) through the
//! transition controller.

use time::OffsetDateTime;

use shiftline_core::{BusinessDay, Period, PeriodCatalog};

/// The resolver's answer for one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The time-bound period containing `now`, or `None` in a gap.
    pub current: Option<Period>,
    /// The nearest upcoming time-bound period strictly after `now`,
    /// wrapping to the opening period of the next business day.
    pub next: Option<Period>,
}

/// The `[start, end)` window of a time-bound period on a business day.
///
/// Returns `None` for event-driven periods.
pub fn period_window(
    period: &Period,
    day: BusinessDay,
    reset_hour: u8,
    offset: time::UtcOffset,
) -> Option<(OffsetDateTime, OffsetDateTime)> {
    let (start, end) = period.bounds()?;
    let start_at = day.anchor(start.to_time(), reset_hour, offset);
    let mut end_at = day.anchor(end.to_time(), reset_hour, offset);
    if end_at <= start_at {
        // Degenerate config (start == end); treat as an instant-wide window.
        end_at = start_at;
    }
    Some((start_at, end_at))
}

/// Resolve the current and next time-bound periods at `now`.
pub fn resolve(catalog: &PeriodCatalog, reset_hour: u8, now: OffsetDateTime) -> Resolution {
    let offset = now.offset();
    let day = BusinessDay::from_instant(now, reset_hour);

    let mut current = None;
    for period in catalog.time_bound() {
        if let Some((start_at, end_at)) = period_window(period, day, reset_hour, offset) {
            if now >= start_at && now < end_at {
                current = Some(period.clone());
                break;
            }
        }
    }

    // Nearest upcoming start strictly after now, today.
    let mut next: Option<(OffsetDateTime, &Period)> = None;
    for period in catalog.time_bound() {
        if let Some((start_at, _)) = period_window(period, day, reset_hour, offset) {
            if start_at > now && next.map_or(true, |(best, _)| start_at < best) {
                next = Some((start_at, period));
            }
        }
    }

    // Nothing left today: wrap to the first time-bound period of the next
    // business day.
    let next = next
        .map(|(_, p)| p.clone())
        .or_else(|| catalog.time_bound().next().cloned());

    Resolution { current, next }
}
