//! The manual transition controller: one serialized reducer over the
//! whole session state.
//!
//! Every mutation (timer ticks, operator actions, completion events,
//! review decisions, store refreshes) funnels through [`Engine::apply`]
//! as a [`Command`]. A command either fails validation with no state
//! change at all, or applies its full set of field updates before
//! returning, so readers observe transitions fully-before or fully-after.
//! Timers never touch state directly; they enqueue commands.
//!
//! Key invariant: the completed-task-id history accumulates across the
//! whole business day. Manual transitions sweep *obligations* (missing
//! tasks); they never erase completions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use time::OffsetDateTime;

use shiftline_core::{BusinessDay, Period, RestaurantConfig, TaskTemplate};
use shiftline_storage::{CompletionRecord, ReviewDecision, ReviewStatus};

use crate::error::{EngineError, OutstandingTask};
use crate::reset::ResetScheduler;
use crate::resolver::{period_window, resolve};
use crate::review::{apply_decision, materialize_review_task};
use crate::tracker::{MissingTask, Tracker};

/// Session mode of the transition controller.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    /// Time-based resolution drives the current period.
    Automatic,
    /// Operator forced progression into the named period; automatic
    /// resolution resumes once real time catches up.
    ManuallyAdvanced(String),
    /// Operator (or fallback time) declared the last customer gone; the
    /// closing period is current and has no natural end.
    ManualClosing,
    /// Closing completed; idle until time reaches the opening period.
    WaitingForNextDay,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Automatic => f.write_str("in automatic mode"),
            Mode::ManuallyAdvanced(p) => write!(f, "manually advanced to '{}'", p),
            Mode::ManualClosing => f.write_str("closing the store"),
            Mode::WaitingForNextDay => f.write_str("waiting for the next day"),
        }
    }
}

/// Everything that can drive the engine.
#[derive(Debug, Clone)]
pub enum Command {
    /// Low-frequency re-evaluation: reset check, resolution, reconcile,
    /// fallback entry, invariant self-check.
    Tick,
    /// Bounded-interval missing-task recomputation + overdue detection.
    ScanMissing,
    /// Operator forces progression past the current period.
    AdvanceTo { period_id: String },
    /// Operator declares the last customer has left.
    LastCustomerLeft,
    /// Operator confirms the store is closed.
    CompleteClosing,
    /// The store acknowledged a submission for this task.
    TaskCompleted { task_id: String },
    /// The store acknowledged a supervisor decision on a review task.
    ReviewDecided {
        review_task_id: String,
        decision: ReviewDecision,
    },
    /// Periodic store refresh: the actor's active records for the day.
    Refresh { records: Vec<CompletionRecord> },
    /// Pending review records for the whole day, across actors. Keeps a
    /// supervisor's session aware of submissions made in other sessions.
    SyncReviews { records: Vec<CompletionRecord> },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Tick => "tick",
            Command::ScanMissing => "scan-missing",
            Command::AdvanceTo { .. } => "advance-to",
            Command::LastCustomerLeft => "last-customer-left",
            Command::CompleteClosing => "complete-closing",
            Command::TaskCompleted { .. } => "task-completed",
            Command::ReviewDecided { .. } => "review-decided",
            Command::Refresh { .. } => "refresh",
            Command::SyncReviews { .. } => "sync-reviews",
        }
    }
}

/// Side effects a command produced, for the session to act on
/// (notifications, logging). Effects never carry state the engine needs
/// back.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    PeriodStarted {
        period_id: String,
        period_name: String,
        pending_count: usize,
    },
    /// Real time caught up with a manual advance.
    Reconciled { period_id: String },
    EnteredClosing {
        /// True when the configured fallback time fired instead of an
        /// operator signal.
        synthetic: bool,
    },
    ClosingCompleted,
    Overdue {
        task_id: String,
        title: String,
        minutes_late: i64,
    },
    ResetFired {
        new_day: BusinessDay,
    },
    ReviewRequested {
        review_task_id: String,
    },
    /// The self-check found and repaired an impossible state.
    InvariantRepaired { detail: String },
}

/// A read-only snapshot of session state for the UI layer.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StateView {
    pub day: BusinessDay,
    pub mode: Mode,
    pub current: Option<Period>,
    pub next: Option<Period>,
    pub missing: Vec<MissingTask>,
    pub completed: BTreeSet<String>,
}

/// The per-session period/task state machine.
pub struct Engine {
    config: Arc<RestaurantConfig>,
    day: BusinessDay,
    mode: Mode,
    current: Option<Period>,
    next: Option<Period>,
    tracker: Tracker,
    reset: ResetScheduler,
    /// Review tasks materialized this day (autogenerated).
    generated: Vec<TaskTemplate>,
    /// Which actor submitted each task awaiting review, keyed by the
    /// original task id. Review decisions must target the submitter's
    /// store record, not the reviewer's.
    review_submitters: BTreeMap<String, String>,
    /// Tasks already reported overdue, to notify once.
    notified_overdue: BTreeSet<String>,
}

impl Engine {
    pub fn new(config: Arc<RestaurantConfig>, now: OffsetDateTime) -> Self {
        let day = BusinessDay::from_instant(now, config.reset_hour);
        let resolution = resolve(&config.periods, config.reset_hour, now);
        let mut reset = ResetScheduler::new(config.reset_hour);
        // Prime the scheduler so the first tick sees an edge relative to
        // the construction instant, not to its own first observation.
        let _ = reset.check(now);
        Engine {
            day,
            mode: Mode::Automatic,
            current: resolution.current,
            next: resolution.next,
            tracker: Tracker::new(day),
            reset,
            generated: Vec::new(),
            review_submitters: BTreeMap::new(),
            notified_overdue: BTreeSet::new(),
            config,
        }
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn day(&self) -> BusinessDay {
        self.day
    }

    pub fn current(&self) -> Option<&Period> {
        self.current.as_ref()
    }

    pub fn next(&self) -> Option<&Period> {
        self.next.as_ref()
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// The actor whose record a pending review refers to, by original
    /// task id.
    pub fn review_submitter(&self, original_id: &str) -> Option<&str> {
        self.review_submitters.get(original_id).map(String::as_str)
    }

    /// Look up a task among the configured set and the materialized
    /// review tasks.
    pub fn find_task(&self, task_id: &str) -> Option<&TaskTemplate> {
        self.config
            .tasks
            .get(task_id)
            .or_else(|| self.generated.iter().find(|t| t.id == task_id))
    }

    /// Snapshot for the UI layer.
    pub fn view(&self, now: OffsetDateTime) -> StateView {
        StateView {
            day: self.day,
            mode: self.mode.clone(),
            current: self.current.clone(),
            next: self.next.clone(),
            missing: self.missing_now(now),
            completed: self.tracker.completed_ids().clone(),
        }
    }

    /// Apply one command. Validation failures return `Err` with no state
    /// change; on `Ok` every field update of the transition has been
    /// applied.
    pub fn apply(
        &mut self,
        command: Command,
        now: OffsetDateTime,
    ) -> Result<Vec<Effect>, EngineError> {
        match command {
            Command::Tick => Ok(self.tick(now)),
            Command::ScanMissing => Ok(self.scan_missing(now)),
            Command::AdvanceTo { period_id } => self.advance_to(&period_id, now),
            Command::LastCustomerLeft => self.last_customer_left(now, false),
            Command::CompleteClosing => self.complete_closing(now),
            Command::TaskCompleted { task_id } => self.task_completed(&task_id),
            Command::ReviewDecided {
                review_task_id,
                decision,
            } => self.review_decided(&review_task_id, &decision),
            Command::Refresh { records } => Ok(self.refresh(records)),
            Command::SyncReviews { records } => Ok(self.sync_reviews(records)),
        }
    }

    // ── Tick: reset, resolution, reconcile, fallback, self-check ─────

    fn tick(&mut self, now: OffsetDateTime) -> Vec<Effect> {
        let mut effects = Vec::new();

        if let Some(event) = self.reset.check(now) {
            tracing::info!(day = %event.new_day, "daily reset");
            self.day = event.new_day;
            self.tracker.roll_to(event.new_day);
            self.generated.clear();
            self.review_submitters.clear();
            self.notified_overdue.clear();
            self.mode = Mode::Automatic;
            effects.push(Effect::ResetFired {
                new_day: event.new_day,
            });
        }

        let resolution = resolve(&self.config.periods, self.config.reset_hour, now);
        match self.mode.clone() {
            Mode::Automatic => {
                let changed = resolution.current.as_ref().map(|p| p.id.as_str())
                    != self.current.as_ref().map(|p| p.id.as_str());
                self.current = resolution.current;
                self.next = resolution.next;
                if changed {
                    if let Some(period) = self.current.clone() {
                        let pending = self.pending_count(&period.id);
                        tracing::info!(period = %period.id, pending, "period started");
                        effects.push(Effect::PeriodStarted {
                            period_id: period.id,
                            period_name: period.name,
                            pending_count: pending,
                        });
                    }
                }
            }
            Mode::ManuallyAdvanced(target) => {
                // Caught up once the target's window has started. Checking
                // the start (not equality with the time-based current)
                // tolerates a clock jump past the whole window.
                let caught_up = self
                    .config
                    .periods
                    .get(&target)
                    .and_then(|p| {
                        period_window(p, self.day, self.config.reset_hour, now.offset())
                    })
                    .is_some_and(|(start_at, _)| now >= start_at);
                if caught_up {
                    self.mode = Mode::Automatic;
                    self.current = resolution.current;
                    self.next = resolution.next;
                    tracing::info!(period = %target, "reconciled to automatic");
                    effects.push(Effect::Reconciled { period_id: target });
                }
            }
            Mode::ManualClosing => {
                // Closing has no natural end; time does not move us.
            }
            Mode::WaitingForNextDay => {
                let opening_id = self.config.periods.opening().map(|p| p.id.clone());
                if resolution.current.as_ref().map(|p| p.id.as_str())
                    == opening_id.as_deref()
                {
                    self.mode = Mode::Automatic;
                    self.current = resolution.current;
                    self.next = resolution.next;
                    if let Some(period) = self.current.clone() {
                        let pending = self.pending_count(&period.id);
                        effects.push(Effect::PeriodStarted {
                            period_id: period.id,
                            period_name: period.name,
                            pending_count: pending,
                        });
                    }
                }
            }
        }

        if let Some(effect) = self.check_fallback_entry(now) {
            effects.push(effect);
        }
        effects.extend(self.self_check(now));
        effects
    }

    /// Enter closing on the configured fallback time if the operator
    /// never signalled.
    fn check_fallback_entry(&mut self, now: OffsetDateTime) -> Option<Effect> {
        if !matches!(self.mode, Mode::Automatic | Mode::ManuallyAdvanced(_)) {
            return None;
        }
        let closing = self.config.periods.closing()?;
        let fallback = match &closing.kind {
            shiftline_core::PeriodKind::EventDriven { fallback_entry } => (*fallback_entry)?,
            shiftline_core::PeriodKind::TimeBound { .. } => return None,
        };
        let at = self
            .day
            .anchor(fallback.to_time(), self.config.reset_hour, now.offset());
        if now < at {
            return None;
        }
        tracing::warn!(fallback = %fallback, "no last-customer signal; fallback closing entry");
        match self.last_customer_left(now, true) {
            Ok(effects) => effects.into_iter().next(),
            Err(_) => None,
        }
    }

    /// Detect and repair impossible mode/period combinations rather than
    /// crashing the session.
    fn self_check(&mut self, now: OffsetDateTime) -> Vec<Effect> {
        let broken = match &self.mode {
            Mode::ManualClosing => !self
                .current
                .as_ref()
                .is_some_and(|p| p.is_event_driven()),
            Mode::ManuallyAdvanced(target) => self
                .config
                .periods
                .get(target)
                .map_or(true, |p| p.is_event_driven()),
            Mode::Automatic | Mode::WaitingForNextDay => false,
        };
        if !broken {
            return Vec::new();
        }
        let detail = format!("impossible state: {} with current={:?}", self.mode, {
            self.current.as_ref().map(|p| p.id.as_str())
        });
        tracing::warn!(%detail, "invariant violated; failing safe to automatic");
        let resolution = resolve(&self.config.periods, self.config.reset_hour, now);
        self.mode = Mode::Automatic;
        self.current = resolution.current;
        self.next = resolution.next;
        vec![Effect::InvariantRepaired { detail }]
    }

    // ── Missing scan + overdue notification ──────────────────────────

    fn missing_now(&self, now: OffsetDateTime) -> Vec<MissingTask> {
        if self.mode == Mode::WaitingForNextDay {
            return Vec::new();
        }
        self.tracker.missing_tasks(
            &self.config.periods,
            &self.config.tasks,
            self.config.reset_hour,
            now,
            self.current.as_ref().map(|p| p.id.as_str()),
        )
    }

    fn scan_missing(&mut self, now: OffsetDateTime) -> Vec<Effect> {
        let mut effects = Vec::new();
        for missing in self.missing_now(now) {
            if !self.notified_overdue.insert(missing.task_id.clone()) {
                continue;
            }
            let minutes_late = self
                .config
                .periods
                .get(&missing.period_id)
                .and_then(|p| {
                    period_window(p, self.day, self.config.reset_hour, now.offset())
                })
                .map(|(_, end_at)| ((now - end_at).whole_minutes()).max(0))
                .unwrap_or(0);
            effects.push(Effect::Overdue {
                task_id: missing.task_id,
                title: missing.title,
                minutes_late,
            });
        }
        effects
    }

    // ── Operator transitions ─────────────────────────────────────────

    fn advance_to(
        &mut self,
        period_id: &str,
        _now: OffsetDateTime,
    ) -> Result<Vec<Effect>, EngineError> {
        if self.mode != Mode::Automatic {
            return Err(EngineError::InvalidMode {
                command: "advance-to".to_string(),
                mode: self.mode.to_string(),
            });
        }
        let target = self
            .config
            .periods
            .get(period_id)
            .ok_or_else(|| EngineError::UnknownPeriod {
                period_id: period_id.to_string(),
            })?
            .clone();
        if target.is_event_driven() {
            return Err(EngineError::InvalidAdvance {
                period_id: period_id.to_string(),
                reason: "closing is entered via last-customer-left".to_string(),
            });
        }
        let current = self.current.clone().ok_or_else(|| EngineError::InvalidAdvance {
            period_id: period_id.to_string(),
            reason: "no active period to advance from".to_string(),
        })?;
        let from_ord = self.config.periods.ordinal(&current.id).unwrap_or(0);
        let to_ord = self.config.periods.ordinal(&target.id).unwrap_or(0);
        if to_ord <= from_ord {
            return Err(EngineError::InvalidAdvance {
                period_id: period_id.to_string(),
                reason: format!("'{}' is not after '{}'", target.id, current.id),
            });
        }

        // Validated; apply the whole transition.
        self.tracker
            .sweep_period(&current.id, &current.name, &self.config.tasks);
        self.next = self.following_time_bound(&target.id);
        self.current = Some(target.clone());
        self.mode = Mode::ManuallyAdvanced(target.id.clone());
        tracing::info!(from = %current.id, to = %target.id, "manual advance");
        let pending = self.pending_count(&target.id);
        Ok(vec![Effect::PeriodStarted {
            period_id: target.id,
            period_name: target.name,
            pending_count: pending,
        }])
    }

    fn last_customer_left(
        &mut self,
        _now: OffsetDateTime,
        synthetic: bool,
    ) -> Result<Vec<Effect>, EngineError> {
        if !matches!(self.mode, Mode::Automatic | Mode::ManuallyAdvanced(_)) {
            return Err(EngineError::InvalidMode {
                command: "last-customer-left".to_string(),
                mode: self.mode.to_string(),
            });
        }
        let closing = self
            .config
            .periods
            .closing()
            .ok_or(EngineError::NoClosingPeriod)?
            .clone();

        // One atomic unit: sweep the exited period, materialize review
        // tasks, set closing current, clear next. The completed-id
        // history is untouched.
        if let Some(exited) = self.current.clone() {
            self.tracker
                .sweep_period(&exited.id, &exited.name, &self.config.tasks);
        }
        self.materialize_pending_reviews();
        self.mode = Mode::ManualClosing;
        self.current = Some(closing);
        self.next = None;
        tracing::info!(synthetic, "entered manual closing");
        Ok(vec![Effect::EnteredClosing { synthetic }])
    }

    fn complete_closing(&mut self, now: OffsetDateTime) -> Result<Vec<Effect>, EngineError> {
        if self.mode != Mode::ManualClosing {
            return Err(EngineError::InvalidMode {
                command: "complete-closing".to_string(),
                mode: self.mode.to_string(),
            });
        }
        let closing = self
            .config
            .periods
            .closing()
            .ok_or(EngineError::NoClosingPeriod)?
            .clone();

        let mut outstanding: Vec<OutstandingTask> = Vec::new();
        let mut seen: BTreeSet<String> = BTreeSet::new();
        for missing in self.missing_now(now) {
            if seen.insert(missing.task_id.clone()) {
                outstanding.push((&missing).into());
            }
        }
        for task in self.closing_tasks(&closing.id) {
            if task.is_notice || task.is_floating {
                continue;
            }
            if !self.tracker.is_complete(&task) && seen.insert(task.id.clone()) {
                outstanding.push(OutstandingTask {
                    task_id: task.id.clone(),
                    title: task.title.clone(),
                    period_name: closing.name.clone(),
                });
            }
        }
        if !outstanding.is_empty() {
            return Err(EngineError::ClosingBlocked { outstanding });
        }

        // Gate passed: clear the day's tracked state; persisted records
        // belong to the day just ended and stay put.
        self.tracker.roll_to(self.day);
        self.generated.clear();
        self.review_submitters.clear();
        self.notified_overdue.clear();
        self.mode = Mode::WaitingForNextDay;
        self.current = None;
        self.next = self.config.periods.opening().cloned();
        tracing::info!("closing complete; waiting for next day");
        Ok(vec![Effect::ClosingCompleted])
    }

    // ── Completion + review events ───────────────────────────────────

    fn task_completed(&mut self, task_id: &str) -> Result<Vec<Effect>, EngineError> {
        let task = self
            .find_task(task_id)
            .ok_or_else(|| EngineError::UnknownTask {
                task_id: task_id.to_string(),
            })?
            .clone();
        if task.is_notice {
            return Err(EngineError::InvalidMode {
                command: "task-completed".to_string(),
                mode: format!("'{}' is informational only", task.id),
            });
        }
        self.tracker.record_completion(&task);
        let mut effects = Vec::new();
        if task.requires_review {
            self.tracker
                .set_review_status(&task.id, ReviewStatus::Pending);
            if let Some(review_id) = self.ensure_review_task(&task) {
                effects.push(Effect::ReviewRequested {
                    review_task_id: review_id,
                });
            }
        }
        Ok(effects)
    }

    fn review_decided(
        &mut self,
        review_task_id: &str,
        decision: &ReviewDecision,
    ) -> Result<Vec<Effect>, EngineError> {
        let review_task = self
            .find_task(review_task_id)
            .ok_or_else(|| EngineError::UnknownTask {
                task_id: review_task_id.to_string(),
            })?
            .clone();
        if !review_task.is_review() {
            return Err(EngineError::NotReviewable {
                task_id: review_task_id.to_string(),
            });
        }
        apply_decision(&mut self.tracker, &review_task, decision);
        Ok(Vec::new())
    }

    fn refresh(&mut self, records: Vec<CompletionRecord>) -> Vec<Effect> {
        for record in records {
            if record.day != self.day {
                continue;
            }
            let Some(task) = self.find_task(&record.task_id).cloned() else {
                continue;
            };
            if task.is_floating {
                // The active record's revision is the day's submission
                // count; rehydrate it so a restarted session keeps
                // counting from where the store left off.
                self.tracker.set_floating_count(&task.id, record.revision);
                continue;
            }
            self.tracker.merge_completed([record.task_id.clone()]);
            if task.requires_review {
                self.tracker
                    .set_review_status(&task.id, record.review_status);
                if record.review_status == ReviewStatus::Pending {
                    self.review_submitters
                        .insert(task.id.clone(), record.actor_id.clone());
                    self.ensure_review_task(&task);
                }
            }
        }
        Vec::new()
    }

    /// Merge the day's pending review records, across all actors. Own
    /// submissions arrive through `refresh`; this picks up the rest so a
    /// supervisor sees review work submitted under other sessions.
    fn sync_reviews(&mut self, records: Vec<CompletionRecord>) -> Vec<Effect> {
        let mut effects = Vec::new();
        for record in records {
            if record.day != self.day || record.review_status != ReviewStatus::Pending {
                continue;
            }
            let Some(task) = self.find_task(&record.task_id).cloned() else {
                continue;
            };
            if !task.requires_review {
                continue;
            }
            self.review_submitters
                .insert(task.id.clone(), record.actor_id.clone());
            self.tracker.set_review_status(&task.id, ReviewStatus::Pending);
            if let Some(review_id) = self.ensure_review_task(&task) {
                effects.push(Effect::ReviewRequested {
                    review_task_id: review_id,
                });
            }
        }
        effects
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// The configured-or-generated review task for an original; creates
    /// the generated one on first call. Returns the review task id when
    /// one was newly materialized.
    fn ensure_review_task(&mut self, original: &TaskTemplate) -> Option<String> {
        let configured = self
            .config
            .tasks
            .tasks()
            .iter()
            .any(|t| t.is_review() && t.linked_task_ids.contains(&original.id));
        if configured {
            return None;
        }
        if self
            .generated
            .iter()
            .any(|t| t.linked_task_ids.contains(&original.id))
        {
            return None;
        }
        let closing_id = self
            .config
            .periods
            .closing()
            .map(|p| p.id.clone())
            .unwrap_or_else(|| original.period_id.clone());
        let review = materialize_review_task(original, &closing_id);
        let id = review.id.clone();
        tracing::debug!(review = %id, original = %original.id, "materialized review task");
        self.generated.push(review);
        Some(id)
    }

    /// Ensure review tasks exist for every completed review-requiring
    /// task (closing entry may precede the 60s refresh).
    fn materialize_pending_reviews(&mut self) {
        let pending: Vec<TaskTemplate> = self
            .config
            .tasks
            .tasks()
            .iter()
            .filter(|t| {
                t.requires_review && self.tracker.completed_ids().contains(&t.id)
            })
            .cloned()
            .collect();
        for task in pending {
            self.ensure_review_task(&task);
        }
    }

    /// Configured + generated tasks of one period.
    fn closing_tasks(&self, period_id: &str) -> Vec<TaskTemplate> {
        let mut tasks: Vec<TaskTemplate> =
            self.config.tasks.for_period(period_id).cloned().collect();
        tasks.extend(
            self.generated
                .iter()
                .filter(|t| t.period_id == period_id)
                .cloned(),
        );
        tasks
    }

    fn pending_count(&self, period_id: &str) -> usize {
        self.config
            .tasks
            .for_period(period_id)
            .filter(|t| t.is_trackable() && !self.tracker.is_complete(t))
            .count()
    }

    /// The next time-bound period after `period_id` in catalog order,
    /// wrapping to the opening period.
    fn following_time_bound(&self, period_id: &str) -> Option<Period> {
        let ord = self.config.periods.ordinal(period_id)?;
        self.config
            .periods
            .periods()
            .iter()
            .skip(ord + 1)
            .find(|p| !p.is_event_driven())
            .cloned()
            .or_else(|| self.config.periods.opening().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const CONFIG: &str = r#"{
        "restaurant": "demo",
        "utc_offset_hours": 0,
        "reset_hour": 10,
        "periods": [
            {"id": "opening", "name": "开店", "kind": "time_bound", "start": "10:00", "end": "10:30"},
            {"id": "lunch-prep", "name": "午市准备", "kind": "time_bound", "start": "10:30", "end": "11:30"},
            {"id": "lunch-service", "name": "午市", "kind": "time_bound", "start": "11:30", "end": "14:00"},
            {"id": "closing", "name": "闭店", "kind": "event_driven", "fallback_entry": "23:30"}
        ],
        "tasks": [
            {"id": "opening-task-1", "title": "开灯检查", "role": "manager",
             "period_id": "opening", "upload": "photo"},
            {"id": "prep-task-1", "title": "备料确认", "role": "chef",
             "period_id": "lunch-prep"},
            {"id": "service-notice", "title": "高峰提醒", "role": "manager",
             "period_id": "lunch-service", "is_notice": true},
            {"id": "closing-task-1", "title": "关店巡检", "role": "duty_manager",
             "period_id": "closing", "upload": "photo", "requires_review": true},
            {"id": "temp-log", "title": "温度记录", "role": "chef",
             "period_id": "lunch-service", "is_floating": true}
        ]
    }"#;

    fn engine_at(now: OffsetDateTime) -> Engine {
        let config: RestaurantConfig =
            shiftline_core::RestaurantConfig::from_json_str(CONFIG).unwrap();
        config.validate().unwrap();
        Engine::new(Arc::new(config), now)
    }

    #[test]
    fn starts_automatic_with_resolved_period() {
        let engine = engine_at(datetime!(2026-03-05 10:15 UTC));
        assert_eq!(*engine.mode(), Mode::Automatic);
        assert_eq!(engine.current().unwrap().id, "opening");
        assert_eq!(engine.next().unwrap().id, "lunch-prep");
    }

    #[test]
    fn advance_requires_a_later_period() {
        let mut engine = engine_at(datetime!(2026-03-05 11:00 UTC));
        let err = engine
            .apply(
                Command::AdvanceTo {
                    period_id: "opening".to_string(),
                },
                datetime!(2026-03-05 11:00 UTC),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAdvance { .. }));
    }

    #[test]
    fn advance_sweeps_the_exited_period() {
        let now = datetime!(2026-03-05 10:15 UTC);
        let mut engine = engine_at(now);
        let effects = engine
            .apply(
                Command::AdvanceTo {
                    period_id: "lunch-service".to_string(),
                },
                now,
            )
            .unwrap();
        assert_eq!(
            *engine.mode(),
            Mode::ManuallyAdvanced("lunch-service".to_string())
        );
        assert_eq!(engine.current().unwrap().id, "lunch-service");
        assert!(matches!(effects[0], Effect::PeriodStarted { .. }));
        let missing = engine.missing_now(now);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].task_id, "opening-task-1");
        assert_eq!(missing[0].period_name, "开店");
    }

    #[test]
    fn manual_advance_reconciles_when_time_catches_up() {
        let mut engine = engine_at(datetime!(2026-03-05 10:15 UTC));
        engine
            .apply(
                Command::AdvanceTo {
                    period_id: "lunch-service".to_string(),
                },
                datetime!(2026-03-05 10:15 UTC),
            )
            .unwrap();
        // Still manual at 11:00: real time is in lunch-prep.
        let effects = engine
            .apply(Command::Tick, datetime!(2026-03-05 11:00 UTC))
            .unwrap();
        assert!(effects.is_empty());
        assert!(matches!(engine.mode(), Mode::ManuallyAdvanced(_)));
        // At 11:30 real time enters lunch-service; automatic resumes.
        let effects = engine
            .apply(Command::Tick, datetime!(2026-03-05 11:30 UTC))
            .unwrap();
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::Reconciled { period_id } if period_id == "lunch-service")));
        assert_eq!(*engine.mode(), Mode::Automatic);
    }

    #[test]
    fn reconcile_survives_a_jump_past_the_target_window() {
        let mut engine = engine_at(datetime!(2026-03-05 10:15 UTC));
        engine
            .apply(
                Command::AdvanceTo {
                    period_id: "lunch-service".to_string(),
                },
                datetime!(2026-03-05 10:15 UTC),
            )
            .unwrap();
        // The clock jumps clean over lunch-service (ended 14:00).
        let now = datetime!(2026-03-05 15:00 UTC);
        let effects = engine.apply(Command::Tick, now).unwrap();
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::Reconciled { period_id } if period_id == "lunch-service")));
        assert_eq!(*engine.mode(), Mode::Automatic);
        assert!(engine.current().is_none());
        // The formerly shielded period is back in the missing scan.
        assert!(engine
            .missing_now(now)
            .iter()
            .any(|m| m.task_id == "prep-task-1"));
    }

    #[test]
    fn advance_refused_outside_automatic_mode() {
        let now = datetime!(2026-03-05 12:00 UTC);
        let mut engine = engine_at(now);
        engine.apply(Command::LastCustomerLeft, now).unwrap();
        let err = engine
            .apply(
                Command::AdvanceTo {
                    period_id: "lunch-service".to_string(),
                },
                now,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidMode { .. }));
    }

    #[test]
    fn closing_gate_blocks_then_passes() {
        let now = datetime!(2026-03-05 21:00 UTC);
        let mut engine = engine_at(now);
        engine
            .apply(
                Command::TaskCompleted {
                    task_id: "opening-task-1".to_string(),
                },
                now,
            )
            .unwrap();
        engine
            .apply(
                Command::TaskCompleted {
                    task_id: "prep-task-1".to_string(),
                },
                now,
            )
            .unwrap();
        engine.apply(Command::LastCustomerLeft, now).unwrap();
        assert_eq!(*engine.mode(), Mode::ManualClosing);

        // closing-task-1 not done yet.
        let err = engine.apply(Command::CompleteClosing, now).unwrap_err();
        let EngineError::ClosingBlocked { outstanding } = err else {
            panic!("expected ClosingBlocked");
        };
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].task_id, "closing-task-1");

        // Complete it; it requires review, so a review task appears and
        // blocks in turn.
        let effects = engine
            .apply(
                Command::TaskCompleted {
                    task_id: "closing-task-1".to_string(),
                },
                now,
            )
            .unwrap();
        assert!(matches!(effects[0], Effect::ReviewRequested { .. }));
        let err = engine.apply(Command::CompleteClosing, now).unwrap_err();
        let EngineError::ClosingBlocked { outstanding } = err else {
            panic!("expected ClosingBlocked");
        };
        assert_eq!(outstanding[0].task_id, "review-closing-task-1");

        engine
            .apply(
                Command::ReviewDecided {
                    review_task_id: "review-closing-task-1".to_string(),
                    decision: ReviewDecision::Approve,
                },
                now,
            )
            .unwrap();
        let effects = engine.apply(Command::CompleteClosing, now).unwrap();
        assert_eq!(effects, vec![Effect::ClosingCompleted]);
        assert_eq!(*engine.mode(), Mode::WaitingForNextDay);
        assert!(engine.current().is_none());
        assert_eq!(engine.next().unwrap().id, "opening");
    }

    #[test]
    fn waiting_for_next_day_resumes_at_opening() {
        let now = datetime!(2026-03-05 21:00 UTC);
        let mut engine = engine_at(now);
        engine
            .apply(
                Command::Refresh {
                    records: Vec::new(),
                },
                now,
            )
            .unwrap();
        for id in ["opening-task-1", "prep-task-1", "closing-task-1"] {
            engine
                .apply(
                    Command::TaskCompleted {
                        task_id: id.to_string(),
                    },
                    now,
                )
                .unwrap();
        }
        engine.apply(Command::LastCustomerLeft, now).unwrap();
        engine
            .apply(
                Command::ReviewDecided {
                    review_task_id: "review-closing-task-1".to_string(),
                    decision: ReviewDecision::Approve,
                },
                now,
            )
            .unwrap();
        engine.apply(Command::CompleteClosing, now).unwrap();

        // Ticks through the night change nothing, and nothing is missing.
        let effects = engine
            .apply(Command::Tick, datetime!(2026-03-06 02:00 UTC))
            .unwrap();
        assert!(effects.is_empty());
        assert!(engine.missing_now(datetime!(2026-03-06 02:00 UTC)).is_empty());

        // Reset fires crossing 10:00 and opening begins.
        let effects = engine
            .apply(Command::Tick, datetime!(2026-03-06 10:00 UTC))
            .unwrap();
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::ResetFired { .. })));
        assert!(effects.iter().any(
            |e| matches!(e, Effect::PeriodStarted { period_id, .. } if period_id == "opening")
        ));
        assert_eq!(*engine.mode(), Mode::Automatic);
        assert_eq!(engine.day(), BusinessDay::from_instant(
            datetime!(2026-03-06 10:00 UTC),
            10,
        ));
    }

    #[test]
    fn fallback_entry_enters_closing_without_a_signal() {
        let mut engine = engine_at(datetime!(2026-03-05 14:30 UTC));
        let effects = engine
            .apply(Command::Tick, datetime!(2026-03-05 23:30 UTC))
            .unwrap();
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::EnteredClosing { synthetic: true })));
        assert_eq!(*engine.mode(), Mode::ManualClosing);
    }

    #[test]
    fn fallback_after_midnight_still_belongs_to_the_day() {
        // Fallback at 23:30 anchored to the business day: a tick at
        // 00:10 the next calendar date (before reset) must enter closing,
        // not wait for the "next" 23:30.
        let mut engine = engine_at(datetime!(2026-03-05 14:30 UTC));
        let effects = engine
            .apply(Command::Tick, datetime!(2026-03-06 00:10 UTC))
            .unwrap();
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::EnteredClosing { synthetic: true })));
    }

    #[test]
    fn notices_are_never_completable() {
        let now = datetime!(2026-03-05 12:00 UTC);
        let mut engine = engine_at(now);
        let err = engine
            .apply(
                Command::TaskCompleted {
                    task_id: "service-notice".to_string(),
                },
                now,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidMode { .. }));
    }

    #[test]
    fn floating_completions_count_but_never_block() {
        let now = datetime!(2026-03-05 21:00 UTC);
        let mut engine = engine_at(now);
        engine
            .apply(
                Command::TaskCompleted {
                    task_id: "temp-log".to_string(),
                },
                now,
            )
            .unwrap();
        engine
            .apply(
                Command::TaskCompleted {
                    task_id: "temp-log".to_string(),
                },
                now,
            )
            .unwrap();
        assert_eq!(engine.tracker().floating_count("temp-log"), 2);
        let missing = engine.missing_now(now);
        assert!(missing.iter().all(|m| m.task_id != "temp-log"));
    }

    #[test]
    fn scan_reports_each_overdue_task_once() {
        let now = datetime!(2026-03-05 11:00 UTC);
        let mut engine = engine_at(now);
        let effects = engine.apply(Command::ScanMissing, now).unwrap();
        assert_eq!(effects.len(), 1);
        let Effect::Overdue {
            task_id,
            minutes_late,
            ..
        } = &effects[0]
        else {
            panic!("expected Overdue");
        };
        assert_eq!(task_id, "opening-task-1");
        assert_eq!(*minutes_late, 30);
        let effects = engine.apply(Command::ScanMissing, now).unwrap();
        assert!(effects.is_empty());
    }

    #[test]
    fn rejected_review_reopens_and_blocks_again() {
        let now = datetime!(2026-03-05 21:00 UTC);
        let mut engine = engine_at(now);
        for id in ["opening-task-1", "prep-task-1", "closing-task-1"] {
            engine
                .apply(
                    Command::TaskCompleted {
                        task_id: id.to_string(),
                    },
                    now,
                )
                .unwrap();
        }
        engine.apply(Command::LastCustomerLeft, now).unwrap();
        engine
            .apply(
                Command::ReviewDecided {
                    review_task_id: "review-closing-task-1".to_string(),
                    decision: ReviewDecision::Reject {
                        reason: "照片模糊".to_string(),
                    },
                },
                now,
            )
            .unwrap();
        let err = engine.apply(Command::CompleteClosing, now).unwrap_err();
        let EngineError::ClosingBlocked { outstanding } = err else {
            panic!("expected ClosingBlocked");
        };
        assert!(outstanding.iter().any(|t| t.task_id == "closing-task-1"));
    }

    #[test]
    fn refresh_merges_store_records() {
        let now = datetime!(2026-03-05 12:00 UTC);
        let mut engine = engine_at(now);
        let day = engine.day();
        let record = CompletionRecord {
            actor_id: "actor-1".to_string(),
            day,
            task_id: "opening-task-1".to_string(),
            submitted_at: "2026-03-05T10:20:00Z".to_string(),
            evidence: shiftline_storage::Evidence::default(),
            review_status: ReviewStatus::None,
            reject_reason: None,
            revision: 1,
        };
        engine
            .apply(Command::Refresh { records: vec![record] }, now)
            .unwrap();
        assert!(engine.tracker().completed_ids().contains("opening-task-1"));
        // The merged record clears its own task; prep-task-1 (also elapsed,
        // never completed) stays missing.
        let missing = engine.missing_now(now);
        assert!(missing.iter().all(|m| m.task_id != "opening-task-1"));
        assert!(missing.iter().any(|m| m.task_id == "prep-task-1"));
    }

    #[test]
    fn refresh_rehydrates_floating_counts() {
        let now = datetime!(2026-03-05 12:00 UTC);
        let mut engine = engine_at(now);
        let record = CompletionRecord {
            actor_id: "actor-1".to_string(),
            day: engine.day(),
            task_id: "temp-log".to_string(),
            submitted_at: "2026-03-05T11:45:00Z".to_string(),
            evidence: shiftline_storage::Evidence::default(),
            review_status: ReviewStatus::None,
            reject_reason: None,
            revision: 3,
        };
        engine
            .apply(Command::Refresh { records: vec![record] }, now)
            .unwrap();
        assert_eq!(engine.tracker().floating_count("temp-log"), 3);
        // Floating tasks still never enter the completed set.
        assert!(!engine.tracker().completed_ids().contains("temp-log"));
    }

    #[test]
    fn sync_reviews_tracks_another_actors_submission() {
        let now = datetime!(2026-03-05 13:00 UTC);
        let mut engine = engine_at(now);
        let record = CompletionRecord {
            actor_id: "duty-1".to_string(),
            day: engine.day(),
            task_id: "closing-task-1".to_string(),
            submitted_at: "2026-03-05T12:50:00Z".to_string(),
            evidence: shiftline_storage::Evidence::default(),
            review_status: ReviewStatus::Pending,
            reject_reason: None,
            revision: 1,
        };
        let effects = engine
            .apply(Command::SyncReviews { records: vec![record] }, now)
            .unwrap();
        assert_eq!(
            effects,
            vec![Effect::ReviewRequested {
                review_task_id: "review-closing-task-1".to_string(),
            }]
        );
        assert_eq!(engine.review_submitter("closing-task-1"), Some("duty-1"));
        assert_eq!(
            engine.tracker().review_status("closing-task-1"),
            ReviewStatus::Pending
        );
        // Approving clears the submitter-keyed pending state.
        engine
            .apply(
                Command::ReviewDecided {
                    review_task_id: "review-closing-task-1".to_string(),
                    decision: ReviewDecision::Approve,
                },
                now,
            )
            .unwrap();
        assert_eq!(
            engine.tracker().review_status("closing-task-1"),
            ReviewStatus::Approved
        );
    }
}
