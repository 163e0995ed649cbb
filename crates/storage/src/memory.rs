//! In-memory TaskStore backend.
//!
//! Used by tests and the `shiftline simulate` runner. Keeps a full audit
//! history per key; the last revision is the active record.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use shiftline_core::BusinessDay;

use crate::error::StoreError;
use crate::record::{CompletionRecord, Evidence, ReviewDecision, ReviewStatus};
use crate::traits::TaskStore;

/// (actor, day, task), the active-record key.
type Key = (String, BusinessDay, String);

#[derive(Default)]
struct Inner {
    /// Every revision ever submitted, newest last.
    history: BTreeMap<Key, Vec<CompletionRecord>>,
}

impl Inner {
    fn active(&self, key: &Key) -> Option<&CompletionRecord> {
        self.history.get(key).and_then(|revs| revs.last())
    }

    fn active_mut(&mut self, key: &Key) -> Option<&mut CompletionRecord> {
        self.history.get_mut(key).and_then(|revs| revs.last_mut())
    }
}

/// In-memory [`TaskStore`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn timestamp() -> String {
        time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn submit(
        &self,
        actor_id: &str,
        day: BusinessDay,
        task_id: &str,
        evidence: Evidence,
        pending_review: bool,
    ) -> Result<CompletionRecord, StoreError> {
        let mut inner = self.inner.lock().await;
        let key = (actor_id.to_string(), day, task_id.to_string());
        let revision = inner.history.get(&key).map_or(0, |revs| revs.len()) as u32 + 1;
        let record = CompletionRecord {
            actor_id: actor_id.to_string(),
            day,
            task_id: task_id.to_string(),
            submitted_at: Self::timestamp(),
            evidence,
            review_status: if pending_review {
                ReviewStatus::Pending
            } else {
                ReviewStatus::None
            },
            reject_reason: None,
            revision,
        };
        inner.history.entry(key).or_default().push(record.clone());
        Ok(record)
    }

    async fn fetch_completed_ids(
        &self,
        actor_id: &str,
        day: BusinessDay,
    ) -> Result<BTreeSet<String>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .history
            .iter()
            .filter(|((actor, d, _), revs)| {
                actor == actor_id && *d == day && !revs.is_empty()
            })
            .map(|((_, _, task_id), _)| task_id.clone())
            .collect())
    }

    async fn fetch_records(
        &self,
        actor_id: &str,
        day: BusinessDay,
    ) -> Result<Vec<CompletionRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .history
            .iter()
            .filter(|((actor, d, _), _)| actor == actor_id && *d == day)
            .filter_map(|(_, revs)| revs.last().cloned())
            .collect())
    }

    async fn fetch_pending_reviews(
        &self,
        day: BusinessDay,
    ) -> Result<Vec<CompletionRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .history
            .iter()
            .filter(|((_, d, _), _)| *d == day)
            .filter_map(|(_, revs)| revs.last())
            .filter(|record| record.review_status == ReviewStatus::Pending)
            .cloned()
            .collect())
    }

    async fn submission_count(
        &self,
        actor_id: &str,
        day: BusinessDay,
        task_id: &str,
    ) -> Result<u32, StoreError> {
        let inner = self.inner.lock().await;
        let key = (actor_id.to_string(), day, task_id.to_string());
        Ok(inner.history.get(&key).map_or(0, |revs| revs.len()) as u32)
    }

    async fn review_decision(
        &self,
        actor_id: &str,
        day: BusinessDay,
        task_id: &str,
        decision: ReviewDecision,
    ) -> Result<CompletionRecord, StoreError> {
        let mut inner = self.inner.lock().await;
        let key = (actor_id.to_string(), day, task_id.to_string());
        let record = inner
            .active_mut(&key)
            .ok_or_else(|| StoreError::RecordNotFound {
                actor_id: actor_id.to_string(),
                day: day.to_string(),
                task_id: task_id.to_string(),
            })?;
        if record.review_status != ReviewStatus::Pending {
            return Err(StoreError::InvalidDecision {
                task_id: task_id.to_string(),
                status: record.review_status.to_string(),
            });
        }
        match decision {
            ReviewDecision::Approve => {
                record.review_status = ReviewStatus::Approved;
                record.reject_reason = None;
            }
            ReviewDecision::Reject { reason } => {
                record.review_status = ReviewStatus::Rejected;
                record.reject_reason = Some(reason);
            }
        }
        Ok(record.clone())
    }
}
