use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::CohortId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub uuid::Uuid);

impl JobId {
    pub fn new() -> Self {
        JobId(uuid::Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Recompute jobs transition strictly `Pending -> Running -> (Completed |
/// Failed)` (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Running counters surfaced by `GetRecomputeJob` while a job executes
/// (spec.md §4.3, scenario seed 4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub members_found: usize,
    pub total_users: usize,
    pub members_added: usize,
    pub members_removed: usize,
    pub processed_users: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecomputeJob {
    pub id: JobId,
    pub cohort_id: CohortId,
    pub status: JobStatus,
    pub progress: Progress,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl RecomputeJob {
    pub fn new(cohort_id: CohortId, started_at: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            cohort_id,
            status: JobStatus::Pending,
            progress: Progress::default(),
            started_at,
            completed_at: None,
            error: None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Running)
    }
}
