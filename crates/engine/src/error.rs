use std::fmt;

use shiftline_storage::StoreError;

/// A task that still blocks progression, with the period it was missed in.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OutstandingTask {
    pub task_id: String,
    pub title: String,
    pub period_name: String,
}

/// Errors surfaced by the period/task engine.
///
/// Validation failures carry the precise blocking reason so the UI can
/// show staff what to do, not a raw error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A referenced period is not in the catalog.
    UnknownPeriod { period_id: String },
    /// A referenced task is neither configured nor materialized.
    UnknownTask { task_id: String },
    /// Manual advance targeted an event-driven or non-later period.
    InvalidAdvance { period_id: String, reason: String },
    /// The catalog declares no event-driven closing period.
    NoClosingPeriod,
    /// A command is not legal in the session's current mode.
    InvalidMode { command: String, mode: String },
    /// Closing cannot complete while tasks remain outstanding.
    ClosingBlocked { outstanding: Vec<OutstandingTask> },
    /// A review decision targeted a task that is not a review task.
    NotReviewable { task_id: String },
    /// The persistence collaborator failed; in-memory state was not advanced.
    Store(StoreError),
    /// The session task is gone (shut down or crashed).
    SessionClosed,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::UnknownPeriod { period_id } => {
                write!(f, "unknown period: {}", period_id)
            }
            EngineError::UnknownTask { task_id } => {
                write!(f, "unknown task: {}", task_id)
            }
            EngineError::InvalidAdvance { period_id, reason } => {
                write!(f, "cannot advance to '{}': {}", period_id, reason)
            }
            EngineError::NoClosingPeriod => {
                write!(f, "catalog declares no closing period")
            }
            EngineError::InvalidMode { command, mode } => {
                write!(f, "'{}' is not available while {}", command, mode)
            }
            EngineError::ClosingBlocked { outstanding } => {
                write!(f, "{} task(s) outstanding: ", outstanding.len())?;
                let names: Vec<String> = outstanding
                    .iter()
                    .map(|t| format!("{} ({})", t.title, t.period_name))
                    .collect();
                f.write_str(&names.join(", "))
            }
            EngineError::NotReviewable { task_id } => {
                write!(f, "task '{}' is not a review task", task_id)
            }
            EngineError::Store(err) => write!(f, "store call failed: {}", err),
            EngineError::SessionClosed => write!(f, "session is closed"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        EngineError::Store(err)
    }
}
