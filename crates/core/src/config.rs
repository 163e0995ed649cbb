//! The restaurant configuration document.
//!
//! One JSON document per restaurant supplies the period catalog and the
//! task set. It is loaded once per session and treated as immutable for
//! the remainder of the business day.

use serde::{Deserialize, Serialize};

use crate::catalog::PeriodCatalog;
use crate::error::ConfigError;
use crate::task::TaskSet;

fn default_reset_hour() -> u8 {
    10
}

/// A loaded restaurant configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestaurantConfig {
    /// Display name of the restaurant.
    pub restaurant: String,
    /// The restaurant's UTC offset in whole hours (e.g. 8 for CST).
    #[serde(default)]
    pub utc_offset_hours: i8,
    /// Local hour at which the daily reset fires.
    #[serde(default = "default_reset_hour")]
    pub reset_hour: u8,
    pub periods: PeriodCatalog,
    pub tasks: TaskSet,
}

impl RestaurantConfig {
    /// Deserialize from an already-parsed JSON value.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value.clone()).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Deserialize from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the whole document, collecting every problem.
    ///
    /// Returns `Ok(())` when the config is sound, otherwise every error
    /// found (not just the first).
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();
        self.periods.validate(self.reset_hour, &mut errors);
        self.tasks.validate(&self.periods, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The restaurant's UTC offset as a `time::UtcOffset`.
    pub fn utc_offset(&self) -> time::UtcOffset {
        time::UtcOffset::from_hms(self.utc_offset_hours, 0, 0)
            .unwrap_or(time::UtcOffset::UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "restaurant": "demo",
        "utc_offset_hours": 8,
        "reset_hour": 10,
        "periods": [
            {"id": "opening", "name": "开店", "kind": "time_bound", "start": "10:00", "end": "10:30"},
            {"id": "lunch-service", "name": "午市", "kind": "time_bound", "start": "11:30", "end": "14:00"},
            {"id": "closing", "name": "闭店", "kind": "event_driven", "fallback_entry": "22:00"}
        ],
        "tasks": [
            {"id": "opening-task-1", "title": "开灯检查", "role": "manager",
             "period_id": "opening", "upload": "photo"},
            {"id": "closing-task-1", "title": "关店巡检", "role": "duty_manager",
             "period_id": "closing", "upload": "photo", "requires_review": true}
        ]
    }"#;

    #[test]
    fn sample_config_loads_and_validates() {
        let config = RestaurantConfig::from_json_str(SAMPLE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.reset_hour, 10);
        assert_eq!(config.periods.periods().len(), 3);
        assert_eq!(config.periods.closing().unwrap().id, "closing");
        let fallback = config.periods.closing().unwrap();
        match &fallback.kind {
            crate::catalog::PeriodKind::EventDriven { fallback_entry } => {
                assert_eq!(fallback_entry.unwrap().to_string(), "22:00");
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn parse_error_is_reported() {
        let err = RestaurantConfig::from_json_str("{\"restaurant\": 3}").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn reset_hour_defaults_to_ten() {
        let config = RestaurantConfig::from_json_str(
            r#"{"restaurant": "d", "periods": [
                {"id": "opening", "name": "o", "kind": "time_bound", "start": "10:00", "end": "10:30"}
            ], "tasks": []}"#,
        )
        .unwrap();
        assert_eq!(config.reset_hour, 10);
    }
}
