//! Per-actor, per-business-day completion tracking.
//!
//! The tracker mirrors what the store knows (completed ids, review
//! statuses, floating counts) and derives the missing-task list from it.
//! It never talks to the store itself; the session feeds it completion
//! events and refresh results.

use std::collections::{BTreeMap, BTreeSet};

use time::OffsetDateTime;

use shiftline_core::{BusinessDay, PeriodCatalog, TaskSet, TaskTemplate};
use shiftline_storage::ReviewStatus;

use crate::error::OutstandingTask;
use crate::resolver::period_window;

/// One entry in the missing-task list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MissingTask {
    pub task_id: String,
    pub title: String,
    pub period_id: String,
    /// Display name of the period the task was missed in.
    pub period_name: String,
}

impl From<&MissingTask> for OutstandingTask {
    fn from(m: &MissingTask) -> Self {
        OutstandingTask {
            task_id: m.task_id.clone(),
            title: m.title.clone(),
            period_name: m.period_name.clone(),
        }
    }
}

/// Completion state for one (actor, business day).
#[derive(Debug, Clone)]
pub struct Tracker {
    day: BusinessDay,
    completed: BTreeSet<String>,
    floating_counts: BTreeMap<String, u32>,
    review_status: BTreeMap<String, ReviewStatus>,
    /// Tasks swept out of a period by a manual transition, keyed for
    /// exactly-once insertion.
    swept: Vec<MissingTask>,
}

impl Tracker {
    pub fn new(day: BusinessDay) -> Self {
        Tracker {
            day,
            completed: BTreeSet::new(),
            floating_counts: BTreeMap::new(),
            review_status: BTreeMap::new(),
            swept: Vec::new(),
        }
    }

    pub fn day(&self) -> BusinessDay {
        self.day
    }

    /// Daily reset: discard everything and start the new day.
    pub fn roll_to(&mut self, day: BusinessDay) {
        *self = Tracker::new(day);
    }

    pub fn completed_ids(&self) -> &BTreeSet<String> {
        &self.completed
    }

    pub fn floating_count(&self, task_id: &str) -> u32 {
        self.floating_counts.get(task_id).copied().unwrap_or(0)
    }

    pub fn review_status(&self, task_id: &str) -> ReviewStatus {
        self.review_status
            .get(task_id)
            .copied()
            .unwrap_or(ReviewStatus::None)
    }

    /// Rehydrate a floating task's daily count from the store. The active
    /// record's revision equals the day's submission count, so a restarted
    /// session picks up where it left off. Local counts are never lowered.
    pub fn set_floating_count(&mut self, task_id: &str, count: u32) {
        let entry = self.floating_counts.entry(task_id.to_string()).or_insert(0);
        *entry = (*entry).max(count);
    }

    pub fn set_review_status(&mut self, task_id: &str, status: ReviewStatus) {
        self.review_status.insert(task_id.to_string(), status);
    }

    /// Record a completion event that the store has already acknowledged.
    ///
    /// Floating tasks only bump the day's submission count; non-floating
    /// tasks enter the completed set (idempotently; resubmission replaces,
    /// never duplicates).
    pub fn record_completion(&mut self, task: &TaskTemplate) {
        if task.is_floating {
            *self.floating_counts.entry(task.id.clone()).or_insert(0) += 1;
        } else {
            self.completed.insert(task.id.clone());
        }
    }

    /// Remove a task from the completed set (review task reopened after a
    /// rejection).
    pub fn reopen(&mut self, task_id: &str) {
        self.completed.remove(task_id);
    }

    /// Merge a store refresh into local state. The store is authoritative
    /// for ids it reports; local completions submitted this session are
    /// kept (the store call preceded the local insert).
    pub fn merge_completed(&mut self, ids: impl IntoIterator<Item = String>) {
        self.completed.extend(ids);
    }

    /// Whether a task counts as complete for gating purposes.
    ///
    /// A rejected review makes the original incomplete again. A review
    /// task is complete exactly when every linked original is approved;
    /// the status is derived, so every session agrees no matter which
    /// actor's session recorded the decision.
    pub fn is_complete(&self, task: &TaskTemplate) -> bool {
        if task.is_review() {
            return task
                .linked_task_ids
                .iter()
                .all(|id| self.review_status(id) == ReviewStatus::Approved);
        }
        if !self.completed.contains(&task.id) {
            return false;
        }
        self.review_status(&task.id) != ReviewStatus::Rejected
    }

    /// Sweep a period's incomplete trackable tasks into the missing list
    /// (manual advance / last-customer-left). Each task appears exactly
    /// once regardless of how many sweeps touch it.
    pub fn sweep_period(&mut self, period_id: &str, period_name: &str, tasks: &TaskSet) {
        for task in tasks.for_period(period_id) {
            if !task.is_trackable() || self.completed.contains(&task.id) {
                continue;
            }
            if self.swept.iter().any(|m| m.task_id == task.id) {
                continue;
            }
            self.swept.push(MissingTask {
                task_id: task.id.clone(),
                title: task.title.clone(),
                period_id: period_id.to_string(),
                period_name: period_name.to_string(),
            });
        }
    }

    /// The derived missing-task list at `now`.
    ///
    /// Union of the manual sweeps and the elapsed-period scan, minus
    /// anything since completed. Event-driven periods are excluded from
    /// the scan: they have no natural end, so "elapsed" is meaningless
    /// for them. Periods are evaluated against windows anchored to this
    /// tracker's business day, so a closing shift's post-midnight tail
    /// can never be flagged on the following day.
    pub fn missing_tasks(
        &self,
        catalog: &PeriodCatalog,
        tasks: &TaskSet,
        reset_hour: u8,
        now: OffsetDateTime,
        current_period: Option<&str>,
    ) -> Vec<MissingTask> {
        let mut out: Vec<MissingTask> = Vec::new();
        let mut seen: BTreeSet<&str> = BTreeSet::new();

        for m in &self.swept {
            if self.completed.contains(&m.task_id) {
                continue;
            }
            if seen.insert(m.task_id.as_str()) {
                out.push(m.clone());
            }
        }

        for period in catalog.time_bound() {
            if Some(period.id.as_str()) == current_period {
                continue;
            }
            let elapsed = period_window(period, self.day, reset_hour, now.offset())
                .is_some_and(|(_, end_at)| end_at <= now);
            if !elapsed {
                continue;
            }
            for task in tasks.for_period(&period.id) {
                if !task.is_trackable() {
                    continue;
                }
                let incomplete = !self.completed.contains(&task.id)
                    || self.review_status(&task.id) == ReviewStatus::Rejected;
                if !incomplete || !seen.insert(task.id.as_str()) {
                    continue;
                }
                out.push(MissingTask {
                    task_id: task.id.clone(),
                    title: task.title.clone(),
                    period_id: period.id.clone(),
                    period_name: period.name.clone(),
                });
            }
        }

        out
    }
}
