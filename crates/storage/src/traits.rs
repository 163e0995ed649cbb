use std::collections::BTreeSet;

use async_trait::async_trait;

use shiftline_core::BusinessDay;

use crate::error::StoreError;
use crate::record::{CompletionRecord, Evidence, ReviewDecision};

/// The persistence trait for Shiftline backends.
///
/// A `TaskStore` implementation provides durable storage for completion
/// records, keyed by (actor, business day, task). The engine calls it at
/// the edges only: task submission, review decisions, and periodic
/// refresh, never from inside a state transition.
///
/// ## Supersede semantics
///
/// `submit` for a key that already has an active record replaces it (new
/// revision, same key). Backends keep the prior revision in an audit
/// history; only the active record affects `fetch_completed_ids`.
///
/// ## Thread safety
///
/// Implementations must be `Send + Sync + 'static` so one store can be
/// shared across session tasks.
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// Record a submission. Returns the new active record.
    ///
    /// Resubmission after a rejected review resets the record's review
    /// status to `Pending` when `pending_review` is set, otherwise to
    /// `None`.
    async fn submit(
        &self,
        actor_id: &str,
        day: BusinessDay,
        task_id: &str,
        evidence: Evidence,
        pending_review: bool,
    ) -> Result<CompletionRecord, StoreError>;

    /// Active completed task ids for one actor's business day.
    async fn fetch_completed_ids(
        &self,
        actor_id: &str,
        day: BusinessDay,
    ) -> Result<BTreeSet<String>, StoreError>;

    /// All active records for one actor's business day.
    async fn fetch_records(
        &self,
        actor_id: &str,
        day: BusinessDay,
    ) -> Result<Vec<CompletionRecord>, StoreError>;

    /// Active records awaiting review for one business day, across all
    /// actors. Supervisors poll this to pick up submissions made under
    /// other actors' sessions.
    async fn fetch_pending_reviews(
        &self,
        day: BusinessDay,
    ) -> Result<Vec<CompletionRecord>, StoreError>;

    /// Number of submissions (all revisions) for one task on one day.
    /// Floating tasks report their running daily count through this.
    async fn submission_count(
        &self,
        actor_id: &str,
        day: BusinessDay,
        task_id: &str,
    ) -> Result<u32, StoreError>;

    /// Apply a supervisor decision to the active record for
    /// (actor, day, task).
    ///
    /// Returns `Err(StoreError::InvalidDecision)` unless the record's
    /// review status is `Pending`.
    async fn review_decision(
        &self,
        actor_id: &str,
        day: BusinessDay,
        task_id: &str,
        decision: ReviewDecision,
    ) -> Result<CompletionRecord, StoreError>;
}
