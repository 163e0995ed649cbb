//! shiftline-storage: persistence boundary for Shiftline sessions.
//!
//! Provides the [`TaskStore`] trait that stands in for the backing
//! database, the completion record types it traffics in, a bounded-retry
//! helper for transient failures, and an in-memory backend used by tests
//! and the simulator.
//!
//! The engine treats every store call as fallible and never advances its
//! in-memory state before the call resolves.

pub mod conformance;
pub mod error;
pub mod memory;
pub mod record;
pub mod retry;
pub mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use record::{CompletionRecord, Evidence, ReviewDecision, ReviewStatus};
pub use retry::{with_retry, RetryPolicy};
pub use traits::TaskStore;
