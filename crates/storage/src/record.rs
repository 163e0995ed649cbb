use serde::{Deserialize, Serialize};

use shiftline_core::BusinessDay;

/// Supervisor review state attached to a completion record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// The task does not require review, or no review has started.
    #[default]
    None,
    /// Submitted and awaiting the supervisor's decision.
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReviewStatus::None => "none",
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// A supervisor's verdict on a pending review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject { reason: String },
}

/// Evidence attached to a submission. Capture and compression happen in
/// the UI layer; the store only sees the finished payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Evidence {
    #[default]
    None,
    Photo {
        url: String,
    },
    Text {
        body: String,
    },
    Audio {
        url: String,
    },
    Checklist {
        items: Vec<String>,
    },
}

/// One task completion submission.
///
/// Keyed by (actor, business day, task). Resubmission supersedes: the
/// backend keeps the prior revision in its audit history and the new
/// record becomes the active one for the key, with `revision` bumped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub actor_id: String,
    pub day: BusinessDay,
    pub task_id: String,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub submitted_at: String,
    pub evidence: Evidence,
    pub review_status: ReviewStatus,
    pub reject_reason: Option<String>,
    /// 1 for the first submission, incremented by each superseding one.
    pub revision: u32,
}
