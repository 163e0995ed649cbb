/// All errors that can be produced while loading or validating a
/// restaurant configuration document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The document could not be parsed as configuration JSON.
    #[error("config parse error: {0}")]
    Parse(String),

    /// A time-of-day string is not a valid `HH:MM` value.
    #[error("invalid time of day '{value}': {reason}")]
    InvalidTimeOfDay { value: String, reason: String },

    /// The period catalog is empty.
    #[error("period catalog is empty")]
    EmptyCatalog,

    /// Two periods share the same id.
    #[error("duplicate period id: {period_id}")]
    DuplicatePeriod { period_id: String },

    /// The first catalog period must be time-bound (the opening period).
    #[error("first period '{period_id}' must be time-bound")]
    OpeningNotTimeBound { period_id: String },

    /// An event-driven period appears before a time-bound one.
    #[error("event-driven period '{period_id}' must be last in the catalog")]
    EventDrivenNotLast { period_id: String },

    /// More than one event-driven period was declared.
    #[error("catalog declares more than one event-driven period ('{period_id}')")]
    MultipleEventDriven { period_id: String },

    /// Two time-bound periods overlap on the business-day timeline.
    #[error("periods '{first}' and '{second}' overlap")]
    OverlappingPeriods { first: String, second: String },

    /// The reset hour is outside 0..=23.
    #[error("reset hour {hour} is out of range (0-23)")]
    ResetHourOutOfRange { hour: u8 },

    /// Two tasks share the same id.
    #[error("duplicate task id: {task_id}")]
    DuplicateTask { task_id: String },

    /// A task references a period that is not in the catalog.
    #[error("task '{task_id}' references unknown period '{period_id}'")]
    UnknownTaskPeriod { task_id: String, period_id: String },

    /// A task's linked_task_ids reference a task that does not exist.
    #[error("task '{task_id}' links to unknown task '{linked_id}'")]
    UnknownLinkedTask { task_id: String, linked_id: String },

    /// A notice task cannot also be floating.
    #[error("task '{task_id}' is both a notice and floating")]
    NoticeFloatingConflict { task_id: String },

    /// A review task must link at least one task.
    #[error("review task '{task_id}' links no tasks")]
    ReviewWithoutLinks { task_id: String },
}
