//! `HH:MM` wall-clock values.
//!
//! Period boundaries in a restaurant schedule are plain wall-clock times
//! ("11:30", "21:30"). They carry no date and no offset; anchoring to a
//! calendar date is the resolver's job.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// A wall-clock time of day with minute precision.
///
/// Serialized as the `"HH:MM"` string it was parsed from. Ordering is
/// plain clock order; cross-midnight comparison lives in the resolver,
/// not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Construct from hour/minute components.
    ///
    /// Returns `Err` if the components are outside 0-23 / 0-59.
    pub fn new(hour: u8, minute: u8) -> Result<Self, ConfigError> {
        if hour > 23 || minute > 59 {
            return Err(ConfigError::InvalidTimeOfDay {
                value: format!("{:02}:{:02}", hour, minute),
                reason: "hour must be 0-23 and minute 0-59".to_string(),
            });
        }
        Ok(TimeOfDay { hour, minute })
    }

    /// Parse an `"HH:MM"` string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidTimeOfDay {
            value: s.to_string(),
            reason: reason.to_string(),
        };
        let (h, m) = s.split_once(':').ok_or_else(|| invalid("expected HH:MM"))?;
        if h.len() != 2 || m.len() != 2 {
            return Err(invalid("expected two-digit hour and minute"));
        }
        let hour: u8 = h.parse().map_err(|_| invalid("hour is not a number"))?;
        let minute: u8 = m.parse().map_err(|_| invalid("minute is not a number"))?;
        TimeOfDay::new(hour, minute)
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Minutes since midnight (0..=1439).
    pub fn minutes_since_midnight(&self) -> u16 {
        u16::from(self.hour) * 60 + u16::from(self.minute)
    }

    /// Convert to a `time::Time` value.
    pub fn to_time(&self) -> time::Time {
        // Components are range-checked at construction.
        time::Time::from_hms(self.hour, self.minute, 0)
            .unwrap_or(time::Time::MIDNIGHT)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TimeOfDay::parse(&s).map_err(D::Error::custom)
    }
}
