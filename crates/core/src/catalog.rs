//! The period catalog: the ordered schedule of an operating day.
//!
//! A catalog lists the named periods of one restaurant's day in order
//! (opening, prep, lunch service, ... closing). Most periods are
//! time-bound with fixed `HH:MM` start/end boundaries; the closing period
//! is event-driven: it has no natural end and is entered only by an
//! explicit operator trigger (or a configured fallback time).

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::timeofday::TimeOfDay;

/// How a period is entered and exited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PeriodKind {
    /// Fixed start/end wall-clock boundaries. `end` may wrap past
    /// midnight (e.g. 21:30-08:00).
    TimeBound { start: TimeOfDay, end: TimeOfDay },
    /// No natural end; entered only by an explicit trigger. When
    /// `fallback_entry` is set, the engine enters the period on its own
    /// if the clock reaches that time with no trigger received.
    EventDriven {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback_entry: Option<TimeOfDay>,
    },
}

/// One named period of the operating day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub id: String,
    /// Display name shown to staff (missing-task entries are tagged with it).
    pub name: String,
    #[serde(flatten)]
    pub kind: PeriodKind,
}

impl Period {
    pub fn is_event_driven(&self) -> bool {
        matches!(self.kind, PeriodKind::EventDriven { .. })
    }

    /// Start/end boundaries, or `None` for event-driven periods.
    pub fn bounds(&self) -> Option<(TimeOfDay, TimeOfDay)> {
        match self.kind {
            PeriodKind::TimeBound { start, end } => Some((start, end)),
            PeriodKind::EventDriven { .. } => None,
        }
    }
}

/// The ordered period list for one restaurant. Position in the list is
/// the period's ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodCatalog {
    periods: Vec<Period>,
}

impl PeriodCatalog {
    pub fn new(periods: Vec<Period>) -> Self {
        PeriodCatalog { periods }
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn get(&self, id: &str) -> Option<&Period> {
        self.periods.iter().find(|p| p.id == id)
    }

    /// Ordinal position of a period in the catalog.
    pub fn ordinal(&self, id: &str) -> Option<usize> {
        self.periods.iter().position(|p| p.id == id)
    }

    /// The first (opening) period.
    pub fn opening(&self) -> Option<&Period> {
        self.periods.first()
    }

    /// The event-driven closing period, if the catalog declares one.
    pub fn closing(&self) -> Option<&Period> {
        self.periods.iter().find(|p| p.is_event_driven())
    }

    /// Time-bound periods in catalog order.
    pub fn time_bound(&self) -> impl Iterator<Item = &Period> {
        self.periods.iter().filter(|p| !p.is_event_driven())
    }

    /// Structural validation. Collects every problem rather than stopping
    /// at the first.
    pub fn validate(&self, reset_hour: u8, errors: &mut Vec<ConfigError>) {
        if self.periods.is_empty() {
            errors.push(ConfigError::EmptyCatalog);
            return;
        }
        if reset_hour > 23 {
            errors.push(ConfigError::ResetHourOutOfRange { hour: reset_hour });
        }

        let mut seen = std::collections::HashSet::new();
        for p in &self.periods {
            if !seen.insert(p.id.as_str()) {
                errors.push(ConfigError::DuplicatePeriod {
                    period_id: p.id.clone(),
                });
            }
        }

        if let Some(first) = self.periods.first() {
            if first.is_event_driven() {
                errors.push(ConfigError::OpeningNotTimeBound {
                    period_id: first.id.clone(),
                });
            }
        }

        let mut event_driven_seen = false;
        for (i, p) in self.periods.iter().enumerate() {
            if p.is_event_driven() {
                if event_driven_seen {
                    errors.push(ConfigError::MultipleEventDriven {
                        period_id: p.id.clone(),
                    });
                }
                event_driven_seen = true;
                if i + 1 != self.periods.len() {
                    errors.push(ConfigError::EventDrivenNotLast {
                        period_id: p.id.clone(),
                    });
                }
            }
        }

        self.check_overlaps(reset_hour, errors);
    }

    /// Overlap check on the business-day timeline: each time-bound window
    /// is mapped to minutes since the reset boundary (wrapping past
    /// midnight), then checked pairwise.
    fn check_overlaps(&self, reset_hour: u8, errors: &mut Vec<ConfigError>) {
        let reset_min = u32::from(reset_hour) * 60;
        let day_anchor = |t: TimeOfDay| -> u32 {
            let m = u32::from(t.minutes_since_midnight());
            if m >= reset_min {
                m - reset_min
            } else {
                m + 24 * 60 - reset_min
            }
        };

        let windows: Vec<(&Period, u32, u32)> = self
            .time_bound()
            .filter_map(|p| {
                let (start, end) = p.bounds()?;
                let s = day_anchor(start);
                let mut e = day_anchor(end);
                if e <= s {
                    // Wraps past the reset boundary.
                    e += 24 * 60;
                }
                Some((p, s, e))
            })
            .collect();

        for (i, (a, a_start, a_end)) in windows.iter().enumerate() {
            for (b, b_start, b_end) in windows.iter().skip(i + 1) {
                if a_start < b_end && b_start < a_end {
                    errors.push(ConfigError::OverlappingPeriods {
                        first: a.id.clone(),
                        second: b.id.clone(),
                    });
                }
            }
        }
    }
}
