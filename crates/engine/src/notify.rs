//! Notification sinks for session effects.
//!
//! The session forwards period starts and overdue tasks here; the trait
//! keeps delivery (push, in-app banner, log line) out of the engine.

/// Receives staff-facing notifications from a running session.
pub trait Notifier: Send + Sync + 'static {
    fn period_started(&self, period_name: &str, pending_count: usize);
    fn task_overdue(&self, title: &str, minutes_late: i64);
}

/// Discards everything. Useful in tests and batch tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn period_started(&self, _period_name: &str, _pending_count: usize) {}
    fn task_overdue(&self, _title: &str, _minutes_late: i64) {}
}

/// Emits notifications as structured log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn period_started(&self, period_name: &str, pending_count: usize) {
        tracing::info!(period = %period_name, pending = pending_count, "period started");
    }

    fn task_overdue(&self, title: &str, minutes_late: i64) {
        tracing::warn!(task = %title, minutes_late, "task overdue");
    }
}
