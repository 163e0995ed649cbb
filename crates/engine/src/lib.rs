//! Shiftline period/task engine -- resolves the current service period,
//! tracks completions against the configured task set, and runs the
//! manual transition state machine for a restaurant's business day.
//!
//! The engine is a pure reducer ([`Engine`]) over injected time: all
//! wall-clock reads go through [`ClockSource`], so a whole day can be
//! replayed deterministically in tests. [`spawn_session`] wraps the
//! reducer in a tokio task that serializes operator calls, timers, and
//! store refreshes through one queue.

pub mod clock;
pub mod controller;
pub mod error;
pub mod notify;
pub mod reset;
pub mod resolver;
pub mod review;
pub mod session;
pub mod tracker;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use controller::{Command, Effect, Engine, Mode, StateView};
pub use error::{EngineError, OutstandingTask};
pub use notify::{LogNotifier, NoopNotifier, Notifier};
pub use reset::{ResetEvent, ResetScheduler};
pub use resolver::{period_window, resolve, Resolution};
pub use review::{materialize_review_task, review_task_id, supervisor_of};
pub use session::{spawn_session, SessionHandle, SessionOptions};
pub use tracker::{MissingTask, Tracker};
