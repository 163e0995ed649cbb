/// All errors that can be returned by a TaskStore implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No active completion record for the given (actor, day, task).
    #[error("no completion record for task '{task_id}' by '{actor_id}' on {day}")]
    RecordNotFound {
        actor_id: String,
        day: String,
        task_id: String,
    },

    /// A review decision was applied to a record that is not pending
    /// review (already decided, or never submitted for review).
    #[error("task '{task_id}' is not pending review (status: {status})")]
    InvalidDecision { task_id: String, status: String },

    /// Transient backend failure (connection dropped, timeout). Safe to
    /// retry with backoff; see [`crate::retry::with_retry`].
    #[error("store temporarily unavailable: {0}")]
    Unavailable(String),

    /// A backend-specific storage error (corrupt row, serialization).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether retrying this error can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
