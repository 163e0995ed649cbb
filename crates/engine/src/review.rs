//! Review/approval sub-workflow.
//!
//! Some tasks (duty-manager checks, by default) require supervisor
//! sign-off: submitting one materializes a linked review task owned by
//! the supervising role. Approving marks the original approved and the
//! review task complete; rejecting reopens both sides.
//!
//! Per review-linked task the status walk is
//! `None -> Pending -> {Approved | Rejected}`, with `Rejected -> Pending`
//! on resubmission.

use shiftline_core::{Role, TaskTemplate, UploadKind};
use shiftline_storage::{ReviewDecision, ReviewStatus};

use crate::tracker::Tracker;

/// The role that signs off on another role's submissions.
pub fn supervisor_of(role: Role) -> Role {
    match role {
        Role::DutyManager => Role::Manager,
        Role::Chef => Role::Manager,
        Role::Manager => Role::Ceo,
        Role::Ceo => Role::Ceo,
    }
}

/// Conventional id for the review task generated from an original task.
pub fn review_task_id(original_id: &str) -> String {
    format!("review-{}", original_id)
}

/// Build the review task that supervises `original`. It lives in the
/// closing period so the closing gate covers it.
pub fn materialize_review_task(original: &TaskTemplate, closing_period_id: &str) -> TaskTemplate {
    TaskTemplate {
        id: review_task_id(&original.id),
        title: format!("审核: {}", original.title),
        description: format!("Review the submission for '{}'", original.title),
        role: supervisor_of(original.role),
        period_id: closing_period_id.to_string(),
        upload: UploadKind::Review,
        is_notice: false,
        is_floating: false,
        requires_review: false,
        linked_task_ids: vec![original.id.clone()],
        autogenerated: true,
    }
}

/// Apply a supervisor decision to the tracker's view of a review task and
/// its linked originals.
///
/// Approve: every linked original becomes `Approved` and the review task
/// itself is recorded complete. Reject: every linked original becomes
/// `Rejected` and the review task is reopened (removed from the
/// reviewer's completed set) so it can be re-evaluated after the actor
/// resubmits.
pub fn apply_decision(tracker: &mut Tracker, review_task: &TaskTemplate, decision: &ReviewDecision) {
    match decision {
        ReviewDecision::Approve => {
            for original_id in &review_task.linked_task_ids {
                tracker.set_review_status(original_id, ReviewStatus::Approved);
            }
            tracker.record_completion(review_task);
        }
        ReviewDecision::Reject { .. } => {
            for original_id in &review_task.linked_task_ids {
                tracker.set_review_status(original_id, ReviewStatus::Rejected);
            }
            tracker.reopen(&review_task.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftline_core::BusinessDay;
    use time::macros::datetime;

    fn original() -> TaskTemplate {
        TaskTemplate {
            id: "safety-check".to_string(),
            title: "安全巡检".to_string(),
            description: String::new(),
            role: Role::DutyManager,
            period_id: "closing".to_string(),
            upload: UploadKind::Photo,
            is_notice: false,
            is_floating: false,
            requires_review: true,
            linked_task_ids: Vec::new(),
            autogenerated: false,
        }
    }

    fn tracker() -> Tracker {
        Tracker::new(BusinessDay::from_instant(
            datetime!(2024-03-01 12:00 UTC),
            10,
        ))
    }

    #[test]
    fn materialized_review_task_shape() {
        let review = materialize_review_task(&original(), "closing");
        assert_eq!(review.id, "review-safety-check");
        assert_eq!(review.role, Role::Manager);
        assert_eq!(review.upload, UploadKind::Review);
        assert_eq!(review.linked_task_ids, vec!["safety-check".to_string()]);
        assert!(review.autogenerated);
    }

    #[test]
    fn approve_completes_both_sides() {
        let mut tracker = tracker();
        let orig = original();
        let review = materialize_review_task(&orig, "closing");
        tracker.record_completion(&orig);
        tracker.set_review_status(&orig.id, ReviewStatus::Pending);

        apply_decision(&mut tracker, &review, &ReviewDecision::Approve);
        assert_eq!(tracker.review_status(&orig.id), ReviewStatus::Approved);
        assert!(tracker.is_complete(&review));
        assert!(tracker.is_complete(&orig));
    }

    #[test]
    fn reject_reopens_review_and_original() {
        let mut tracker = tracker();
        let orig = original();
        let review = materialize_review_task(&orig, "closing");
        tracker.record_completion(&orig);
        tracker.set_review_status(&orig.id, ReviewStatus::Pending);
        tracker.record_completion(&review);

        apply_decision(
            &mut tracker,
            &review,
            &ReviewDecision::Reject {
                reason: "redo".to_string(),
            },
        );
        assert_eq!(tracker.review_status(&orig.id), ReviewStatus::Rejected);
        assert!(!tracker.is_complete(&orig), "rejected original is incomplete");
        assert!(!tracker.is_complete(&review), "review task is reopened");
    }

    #[test]
    fn review_task_incomplete_until_original_approved() {
        let mut tracker = tracker();
        let orig = original();
        let review = materialize_review_task(&orig, "closing");
        tracker.record_completion(&review);
        tracker.set_review_status(&orig.id, ReviewStatus::Pending);
        assert!(
            !tracker.is_complete(&review),
            "pending original blocks the review task"
        );
    }
}
