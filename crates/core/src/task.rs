//! Task templates: the per-period checklist definitions.
//!
//! Templates are defined once per restaurant configuration and are
//! immutable for the remainder of the business day. Completion state
//! lives elsewhere (the engine tracker and the store); these types only
//! describe what a task *is*.

use serde::{Deserialize, Serialize};

use crate::catalog::PeriodCatalog;
use crate::error::ConfigError;

/// The role a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Manager,
    Chef,
    DutyManager,
    Ceo,
}

/// What kind of evidence a submission must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    #[default]
    None,
    Photo,
    Text,
    Audio,
    Checklist,
    /// Supervisor sign-off on another actor's submission.
    Review,
}

/// One checklist task definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub role: Role,
    /// The period this task belongs to.
    pub period_id: String,
    #[serde(default)]
    pub upload: UploadKind,
    /// Informational only; never completable and never missing.
    #[serde(default)]
    pub is_notice: bool,
    /// Submittable any number of times per day; has no completion state.
    #[serde(default)]
    pub is_floating: bool,
    /// Submission generates a linked review task for the supervising role.
    #[serde(default)]
    pub requires_review: bool,
    /// For review tasks: the task(s) being reviewed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked_task_ids: Vec<String>,
    /// True for tasks materialized by the engine (review tasks), false
    /// for configured ones.
    #[serde(default)]
    pub autogenerated: bool,
}

impl TaskTemplate {
    /// Whether this task counts toward period completion.
    pub fn is_trackable(&self) -> bool {
        !self.is_notice && !self.is_floating
    }

    pub fn is_review(&self) -> bool {
        self.upload == UploadKind::Review
    }
}

/// The full task set for one restaurant, with per-period lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskSet {
    tasks: Vec<TaskTemplate>,
}

impl TaskSet {
    pub fn new(tasks: Vec<TaskTemplate>) -> Self {
        TaskSet { tasks }
    }

    pub fn tasks(&self) -> &[TaskTemplate] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&TaskTemplate> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Tasks belonging to the given period, in definition order.
    pub fn for_period<'a>(&'a self, period_id: &'a str) -> impl Iterator<Item = &'a TaskTemplate> {
        self.tasks.iter().filter(move |t| t.period_id == period_id)
    }

    /// Structural validation against the period catalog. Collects every
    /// problem rather than stopping at the first.
    pub fn validate(&self, catalog: &PeriodCatalog, errors: &mut Vec<ConfigError>) {
        let mut seen = std::collections::HashSet::new();
        for t in &self.tasks {
            if !seen.insert(t.id.as_str()) {
                errors.push(ConfigError::DuplicateTask {
                    task_id: t.id.clone(),
                });
            }
        }

        for t in &self.tasks {
            if catalog.get(&t.period_id).is_none() {
                errors.push(ConfigError::UnknownTaskPeriod {
                    task_id: t.id.clone(),
                    period_id: t.period_id.clone(),
                });
            }
            if t.is_notice && t.is_floating {
                errors.push(ConfigError::NoticeFloatingConflict {
                    task_id: t.id.clone(),
                });
            }
            if t.is_review() && t.linked_task_ids.is_empty() {
                errors.push(ConfigError::ReviewWithoutLinks {
                    task_id: t.id.clone(),
                });
            }
            for linked in &t.linked_task_ids {
                if self.get(linked).is_none() {
                    errors.push(ConfigError::UnknownLinkedTask {
                        task_id: t.id.clone(),
                        linked_id: linked.clone(),
                    });
                }
            }
        }
    }
}
