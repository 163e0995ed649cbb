//! Conformance test suite for `TaskStore` implementations.
//!
//! Backend-agnostic checks that any `TaskStore` implementation can run to
//! verify the semantics the engine relies on:
//!
//! - **Supersede**: resubmission replaces the active record, keeps history
//! - **Review**: pending-only decisions, approve/reject field updates
//! - **Isolation**: records are scoped to (actor, business day)
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function
//! that creates a fresh, empty store instance for each test:
//!
//! ```ignore
//! let report = run_conformance_suite(|| async { MyStore::connect().await }).await;
//! assert_eq!(report.failed, 0, "{report}");
//! ```

use std::fmt;
use std::future::Future;

use shiftline_core::BusinessDay;

use crate::record::{Evidence, ReviewDecision, ReviewStatus};
use crate::{StoreError, TaskStore};

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => TestResult {
                name: name.to_string(),
                passed: true,
                message: None,
            },
            Err(msg) => TestResult {
                name: name.to_string(),
                passed: false,
                message: Some(msg),
            },
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed,
            self.results.len(),
            self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL {}: {}",
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a store backend.
///
/// The `factory` is called once per test to create a fresh, empty store,
/// ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: TaskStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();
    results.push(TestResult::from_result(
        "submit_marks_task_complete",
        submit_marks_task_complete(&factory().await).await,
    ));
    results.push(TestResult::from_result(
        "resubmission_supersedes",
        resubmission_supersedes(&factory().await).await,
    ));
    results.push(TestResult::from_result(
        "review_round_trip",
        review_round_trip(&factory().await).await,
    ));
    results.push(TestResult::from_result(
        "decision_requires_pending",
        decision_requires_pending(&factory().await).await,
    ));
    results.push(TestResult::from_result(
        "records_scoped_to_actor_and_day",
        records_scoped_to_actor_and_day(&factory().await).await,
    ));
    results.push(TestResult::from_result(
        "pending_reviews_span_actors",
        pending_reviews_span_actors(&factory().await).await,
    ));

    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;
    ConformanceReport {
        results,
        passed,
        failed,
    }
}

fn day() -> BusinessDay {
    let noon = time::OffsetDateTime::from_unix_timestamp(1_709_294_400).unwrap_or(
        // 2024-03-01 12:00:00 UTC
        time::OffsetDateTime::UNIX_EPOCH,
    );
    BusinessDay::from_instant(noon, 10)
}

async fn submit_marks_task_complete<S: TaskStore>(store: &S) -> Result<(), String> {
    store
        .submit("alice", day(), "t1", Evidence::None, false)
        .await
        .map_err(|e| format!("submit failed: {}", e))?;
    let ids = store
        .fetch_completed_ids("alice", day())
        .await
        .map_err(|e| format!("fetch failed: {}", e))?;
    if !ids.contains("t1") {
        return Err("submitted task missing from completed ids".to_string());
    }
    Ok(())
}

async fn resubmission_supersedes<S: TaskStore>(store: &S) -> Result<(), String> {
    let r1 = store
        .submit("alice", day(), "t1", Evidence::None, false)
        .await
        .map_err(|e| e.to_string())?;
    let r2 = store
        .submit("alice", day(), "t1", Evidence::None, false)
        .await
        .map_err(|e| e.to_string())?;
    if r2.revision <= r1.revision {
        return Err(format!(
            "expected revision to increase: {} then {}",
            r1.revision, r2.revision
        ));
    }
    let count = store
        .submission_count("alice", day(), "t1")
        .await
        .map_err(|e| e.to_string())?;
    if count != 2 {
        return Err(format!("expected 2 submissions in history, got {}", count));
    }
    let records = store
        .fetch_records("alice", day())
        .await
        .map_err(|e| e.to_string())?;
    if records.len() != 1 {
        return Err(format!("expected 1 active record, got {}", records.len()));
    }
    Ok(())
}

async fn review_round_trip<S: TaskStore>(store: &S) -> Result<(), String> {
    store
        .submit("duty", day(), "t1", Evidence::None, true)
        .await
        .map_err(|e| e.to_string())?;
    let rejected = store
        .review_decision(
            "duty",
            day(),
            "t1",
            ReviewDecision::Reject {
                reason: "blurry photo".to_string(),
            },
        )
        .await
        .map_err(|e| e.to_string())?;
    if rejected.review_status != ReviewStatus::Rejected {
        return Err(format!("expected rejected, got {}", rejected.review_status));
    }
    if rejected.reject_reason.as_deref() != Some("blurry photo") {
        return Err("reject reason not recorded".to_string());
    }
    // Resubmission resets to pending.
    let resubmitted = store
        .submit("duty", day(), "t1", Evidence::None, true)
        .await
        .map_err(|e| e.to_string())?;
    if resubmitted.review_status != ReviewStatus::Pending {
        return Err(format!(
            "expected pending after resubmission, got {}",
            resubmitted.review_status
        ));
    }
    let approved = store
        .review_decision("duty", day(), "t1", ReviewDecision::Approve)
        .await
        .map_err(|e| e.to_string())?;
    if approved.review_status != ReviewStatus::Approved {
        return Err(format!("expected approved, got {}", approved.review_status));
    }
    Ok(())
}

async fn decision_requires_pending<S: TaskStore>(store: &S) -> Result<(), String> {
    store
        .submit("alice", day(), "t1", Evidence::None, false)
        .await
        .map_err(|e| e.to_string())?;
    match store
        .review_decision("alice", day(), "t1", ReviewDecision::Approve)
        .await
    {
        Err(StoreError::InvalidDecision { .. }) => Ok(()),
        Err(other) => Err(format!("expected InvalidDecision, got {}", other)),
        Ok(_) => Err("decision on a non-pending record succeeded".to_string()),
    }
}

async fn records_scoped_to_actor_and_day<S: TaskStore>(store: &S) -> Result<(), String> {
    store
        .submit("alice", day(), "t1", Evidence::None, false)
        .await
        .map_err(|e| e.to_string())?;
    let bob = store
        .fetch_completed_ids("bob", day())
        .await
        .map_err(|e| e.to_string())?;
    if !bob.is_empty() {
        return Err("another actor sees the record".to_string());
    }
    let tomorrow = store
        .fetch_completed_ids("alice", day().next())
        .await
        .map_err(|e| e.to_string())?;
    if !tomorrow.is_empty() {
        return Err("another business day sees the record".to_string());
    }
    Ok(())
}

async fn pending_reviews_span_actors<S: TaskStore>(store: &S) -> Result<(), String> {
    store
        .submit("duty", day(), "t1", Evidence::None, true)
        .await
        .map_err(|e| e.to_string())?;
    store
        .submit("chef", day(), "t2", Evidence::None, false)
        .await
        .map_err(|e| e.to_string())?;
    let pending = store
        .fetch_pending_reviews(day())
        .await
        .map_err(|e| e.to_string())?;
    if pending.len() != 1 {
        return Err(format!("expected 1 pending record, got {}", pending.len()));
    }
    if pending[0].actor_id != "duty" || pending[0].task_id != "t1" {
        return Err("wrong record returned as pending".to_string());
    }
    store
        .review_decision("duty", day(), "t1", ReviewDecision::Approve)
        .await
        .map_err(|e| e.to_string())?;
    let after = store
        .fetch_pending_reviews(day())
        .await
        .map_err(|e| e.to_string())?;
    if !after.is_empty() {
        return Err("approved record still listed as pending".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[tokio::test]
    async fn memory_store_conformance() {
        let report = run_conformance_suite(|| async { MemoryStore::new() }).await;
        assert_eq!(report.failed, 0, "{}", report);
    }
}
