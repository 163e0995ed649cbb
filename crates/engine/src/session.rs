//! The running shift session: one tokio task owning the engine.
//!
//! All operator calls and all timers are serialized through one mpsc
//! queue, so the engine only ever sees one command at a time and never
//! needs interior locking. Submissions are pessimistic: the store call
//! must succeed before the in-memory state advances, so the UI can never
//! show a completion the backend does not hold.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use shiftline_core::RestaurantConfig;
use shiftline_storage::{
    with_retry, CompletionRecord, Evidence, ReviewDecision, RetryPolicy, TaskStore,
};

use crate::clock::ClockSource;
use crate::controller::{Command, Effect, Engine, StateView};
use crate::error::EngineError;
use crate::notify::Notifier;

/// Timer cadence and retry policy for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Actor whose completions this session records.
    pub actor_id: String,
    /// Period resolution / reset / reconcile cadence.
    pub tick_interval: Duration,
    /// Missing-task recomputation cadence.
    pub scan_interval: Duration,
    /// Store refresh cadence.
    pub refresh_interval: Duration,
    pub retry: RetryPolicy,
}

impl SessionOptions {
    pub fn new(actor_id: impl Into<String>) -> Self {
        SessionOptions {
            actor_id: actor_id.into(),
            tick_interval: Duration::from_secs(1),
            scan_interval: Duration::from_secs(30),
            refresh_interval: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

enum Op {
    Command {
        command: Command,
        reply: oneshot::Sender<Result<Vec<Effect>, EngineError>>,
    },
    Submit {
        task_id: String,
        evidence: Evidence,
        reply: oneshot::Sender<Result<CompletionRecord, EngineError>>,
    },
    Review {
        review_task_id: String,
        decision: ReviewDecision,
        reply: oneshot::Sender<Result<CompletionRecord, EngineError>>,
    },
    Refresh {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<StateView>,
    },
    Shutdown,
}

/// Cheap cloneable handle to a running session task.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Op>,
}

impl SessionHandle {
    async fn command(&self, command: Command) -> Result<Vec<Effect>, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Op::Command { command, reply })
            .await
            .map_err(|_| EngineError::SessionClosed)?;
        rx.await.map_err(|_| EngineError::SessionClosed)?
    }

    /// Re-evaluate time-derived state now instead of waiting for the
    /// next timer tick. Used by tools that drive a manual clock.
    pub async fn tick(&self) -> Result<Vec<Effect>, EngineError> {
        self.command(Command::Tick).await
    }

    /// Recompute the missing-task list immediately.
    pub async fn scan_missing(&self) -> Result<Vec<Effect>, EngineError> {
        self.command(Command::ScanMissing).await
    }

    /// Force progression to a later time-bound period.
    pub async fn advance_to(&self, period_id: &str) -> Result<Vec<Effect>, EngineError> {
        self.command(Command::AdvanceTo {
            period_id: period_id.to_string(),
        })
        .await
    }

    /// Declare the last customer gone and enter closing.
    pub async fn last_customer_left(&self) -> Result<Vec<Effect>, EngineError> {
        self.command(Command::LastCustomerLeft).await
    }

    /// Confirm the store is closed; fails while tasks are outstanding.
    pub async fn complete_closing(&self) -> Result<Vec<Effect>, EngineError> {
        self.command(Command::CompleteClosing).await
    }

    /// Submit a completion. The store write happens first; local state
    /// only advances once the backend acknowledged.
    pub async fn submit_task(
        &self,
        task_id: &str,
        evidence: Evidence,
    ) -> Result<CompletionRecord, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Op::Submit {
                task_id: task_id.to_string(),
                evidence,
                reply,
            })
            .await
            .map_err(|_| EngineError::SessionClosed)?;
        rx.await.map_err(|_| EngineError::SessionClosed)?
    }

    /// Record a supervisor decision on a review task.
    pub async fn decide_review(
        &self,
        review_task_id: &str,
        decision: ReviewDecision,
    ) -> Result<CompletionRecord, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Op::Review {
                review_task_id: review_task_id.to_string(),
                decision,
                reply,
            })
            .await
            .map_err(|_| EngineError::SessionClosed)?;
        rx.await.map_err(|_| EngineError::SessionClosed)?
    }

    /// Pull the store's view of the day now instead of waiting for the
    /// next refresh interval.
    pub async fn refresh(&self) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Op::Refresh { reply })
            .await
            .map_err(|_| EngineError::SessionClosed)?;
        rx.await.map_err(|_| EngineError::SessionClosed)
    }

    /// Current state snapshot for display.
    pub async fn snapshot(&self) -> Result<StateView, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Op::Snapshot { reply })
            .await
            .map_err(|_| EngineError::SessionClosed)?;
        rx.await.map_err(|_| EngineError::SessionClosed)
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(Op::Shutdown).await;
    }
}

/// Spawn the session task and return its handle.
pub fn spawn_session(
    config: Arc<RestaurantConfig>,
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn ClockSource>,
    notifier: Arc<dyn Notifier>,
    options: SessionOptions,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(64);
    let session = Session {
        engine: Engine::new(config, clock.now()),
        store,
        clock,
        notifier,
        options,
    };
    tokio::spawn(session.run(rx));
    SessionHandle { tx }
}

struct Session {
    engine: Engine,
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn ClockSource>,
    notifier: Arc<dyn Notifier>,
    options: SessionOptions,
}

impl Session {
    async fn run(mut self, mut rx: mpsc::Receiver<Op>) {
        let mut tick = tokio::time::interval(self.options.tick_interval);
        let mut scan = tokio::time::interval(self.options.scan_interval);
        let mut refresh = tokio::time::interval(self.options.refresh_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        scan.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                op = rx.recv() => {
                    match op {
                        Some(Op::Command { command, reply }) => {
                            let result = self.apply(command);
                            let _ = reply.send(result);
                        }
                        Some(Op::Submit { task_id, evidence, reply }) => {
                            let result = self.submit(&task_id, evidence).await;
                            let _ = reply.send(result);
                        }
                        Some(Op::Review { review_task_id, decision, reply }) => {
                            let result = self.review(&review_task_id, decision).await;
                            let _ = reply.send(result);
                        }
                        Some(Op::Refresh { reply }) => {
                            self.refresh_from_store().await;
                            let _ = reply.send(());
                        }
                        Some(Op::Snapshot { reply }) => {
                            let _ = reply.send(self.engine.view(self.clock.now()));
                        }
                        Some(Op::Shutdown) | None => {
                            tracing::info!("session shutting down");
                            return;
                        }
                    }
                }
                _ = tick.tick() => {
                    let _ = self.apply(Command::Tick);
                }
                _ = scan.tick() => {
                    let _ = self.apply(Command::ScanMissing);
                }
                _ = refresh.tick() => {
                    self.refresh_from_store().await;
                }
            }
        }
    }

    fn apply(&mut self, command: Command) -> Result<Vec<Effect>, EngineError> {
        let effects = self.engine.apply(command, self.clock.now())?;
        for effect in &effects {
            self.dispatch(effect);
        }
        Ok(effects)
    }

    fn dispatch(&self, effect: &Effect) {
        match effect {
            Effect::PeriodStarted {
                period_name,
                pending_count,
                ..
            } => self.notifier.period_started(period_name, *pending_count),
            Effect::Overdue {
                title,
                minutes_late,
                ..
            } => self.notifier.task_overdue(title, *minutes_late),
            _ => {}
        }
    }

    /// Pessimistic completion: validate, persist, then (and only then)
    /// advance in-memory state.
    async fn submit(
        &mut self,
        task_id: &str,
        evidence: Evidence,
    ) -> Result<CompletionRecord, EngineError> {
        let task = self
            .engine
            .find_task(task_id)
            .ok_or_else(|| EngineError::UnknownTask {
                task_id: task_id.to_string(),
            })?
            .clone();
        if task.is_notice {
            return Err(EngineError::InvalidMode {
                command: "submit".to_string(),
                mode: format!("'{}' is informational only", task.id),
            });
        }

        let record = with_retry(self.options.retry, || {
            self.store.submit(
                &self.options.actor_id,
                self.engine.day(),
                task_id,
                evidence.clone(),
                task.requires_review,
            )
        })
        .await?;

        let effects = self.apply(Command::TaskCompleted {
            task_id: task_id.to_string(),
        })?;
        for effect in effects {
            if let Effect::ReviewRequested { review_task_id } = effect {
                tracing::info!(review = %review_task_id, "review requested");
            }
        }
        Ok(record)
    }

    async fn review(
        &mut self,
        review_task_id: &str,
        decision: ReviewDecision,
    ) -> Result<CompletionRecord, EngineError> {
        let review_task = self
            .engine
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

        // Decide against each submitter's record first; only a backend
        // acknowledgment moves local review state. The submitter is
        // whoever the store reported for the pending record, falling
        // back to this session's actor for same-session submissions.
        let day = self.engine.day();
        let mut last = None;
        for original_id in &review_task.linked_task_ids {
            let submitter = self
                .engine
                .review_submitter(original_id)
                .unwrap_or(&self.options.actor_id)
                .to_string();
            let record = with_retry(self.options.retry, || {
                self.store
                    .review_decision(&submitter, day, original_id, decision.clone())
            })
            .await?;
            last = Some(record);
        }
        let record = last.ok_or_else(|| EngineError::NotReviewable {
            task_id: review_task_id.to_string(),
        })?;

        self.apply(Command::ReviewDecided {
            review_task_id: review_task_id.to_string(),
            decision,
        })?;
        Ok(record)
    }

    async fn refresh_from_store(&mut self) {
        let day = self.engine.day();
        let result = with_retry(self.options.retry, || {
            self.store.fetch_records(&self.options.actor_id, day)
        })
        .await;
        match result {
            Ok(records) => {
                let _ = self.apply(Command::Refresh { records });
            }
            Err(err) => {
                tracing::warn!(%err, "store refresh failed; keeping local view");
            }
        }
        // Pending reviews span actors; without this a supervisor never
        // sees submissions made under another actor's session.
        let pending = with_retry(self.options.retry, || {
            self.store.fetch_pending_reviews(day)
        })
        .await;
        match pending {
            Ok(records) => {
                let _ = self.apply(Command::SyncReviews { records });
            }
            Err(err) => {
                tracing::warn!(%err, "pending-review sync failed; keeping local view");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notify::NoopNotifier;
    use shiftline_storage::{MemoryStore, ReviewStatus};
    use time::macros::datetime;

    const CONFIG: &str = r#"{
        "restaurant": "demo",
        "utc_offset_hours": 0,
        "reset_hour": 10,
        "periods": [
            {"id": "opening", "name": "开店", "kind": "time_bound", "start": "10:00", "end": "10:30"},
            {"id": "lunch-service", "name": "午市", "kind": "time_bound", "start": "11:30", "end": "14:00"},
            {"id": "closing", "name": "闭店", "kind": "event_driven"}
        ],
        "tasks": [
            {"id": "opening-task-1", "title": "开灯检查", "role": "manager",
             "period_id": "opening", "upload": "photo"},
            {"id": "closing-task-1", "title": "关店巡检", "role": "duty_manager",
             "period_id": "closing", "requires_review": true}
        ]
    }"#;

    fn start(clock: ManualClock) -> SessionHandle {
        start_with(clock, Arc::new(MemoryStore::new()), "actor-1")
    }

    fn start_with(clock: ManualClock, store: Arc<MemoryStore>, actor: &str) -> SessionHandle {
        let config: RestaurantConfig = RestaurantConfig::from_json_str(CONFIG).unwrap();
        spawn_session(
            Arc::new(config),
            store,
            Arc::new(clock),
            Arc::new(NoopNotifier),
            SessionOptions::new(actor),
        )
    }

    #[tokio::test]
    async fn submit_persists_before_local_state() {
        let clock = ManualClock::new(datetime!(2026-03-05 10:10 UTC));
        let handle = start(clock);

        let record = handle
            .submit_task("opening-task-1", Evidence::Photo {
                url: "https://cdn.example/1.jpg".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(record.task_id, "opening-task-1");
        assert_eq!(record.revision, 1);

        let view = handle.snapshot().await.unwrap();
        assert!(view.completed.contains("opening-task-1"));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_task_never_reaches_the_store() {
        let clock = ManualClock::new(datetime!(2026-03-05 10:10 UTC));
        let handle = start(clock);
        let err = handle
            .submit_task("no-such-task", Evidence::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownTask { .. }));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn full_closing_flow_over_the_session() {
        let clock = ManualClock::new(datetime!(2026-03-05 10:10 UTC));
        let handle = start(clock.clone());

        handle
            .submit_task("opening-task-1", Evidence::default())
            .await
            .unwrap();

        clock.set(datetime!(2026-03-05 21:00 UTC));
        handle
            .submit_task("closing-task-1", Evidence::default())
            .await
            .unwrap();
        handle.last_customer_left().await.unwrap();

        // Pending review blocks the gate.
        let err = handle.complete_closing().await.unwrap_err();
        assert!(matches!(err, EngineError::ClosingBlocked { .. }));

        handle
            .decide_review("review-closing-task-1", ReviewDecision::Approve)
            .await
            .unwrap();
        handle.complete_closing().await.unwrap();

        let view = handle.snapshot().await.unwrap();
        assert_eq!(view.mode, crate::controller::Mode::WaitingForNextDay);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn review_decision_lands_on_the_submitters_record() {
        let clock = ManualClock::new(datetime!(2026-03-05 10:10 UTC));
        let store = Arc::new(MemoryStore::new());
        let duty = start_with(clock.clone(), store.clone(), "duty-1");
        let manager = start_with(clock.clone(), store.clone(), "manager-1");

        duty.submit_task("opening-task-1", Evidence::default())
            .await
            .unwrap();
        clock.set(datetime!(2026-03-05 21:00 UTC));
        duty.submit_task("closing-task-1", Evidence::default())
            .await
            .unwrap();

        // The manager's session learns of the pending submission from
        // the shared store, then decides; the decision must hit the
        // duty manager's record, not the manager's own (empty) key.
        manager.refresh().await.unwrap();
        let record = manager
            .decide_review("review-closing-task-1", ReviewDecision::Approve)
            .await
            .unwrap();
        assert_eq!(record.actor_id, "duty-1");
        assert_eq!(record.review_status, ReviewStatus::Approved);

        // The submitter picks the approval up on its own refresh and
        // can close out the day.
        duty.refresh().await.unwrap();
        duty.last_customer_left().await.unwrap();
        duty.complete_closing().await.unwrap();

        duty.shutdown().await;
        manager.shutdown().await;
    }
}
