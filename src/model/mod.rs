//! Shared data model and wire encodings (spec.md §3).
//!
//! Every type here is a plain value type: no component owns another
//! component's state through these types, they are only ever passed by
//! value or behind `Arc` at the boundaries described in spec.md §5.

mod cohort;
mod event;
mod state;
mod transition;

pub use cohort::{
    Aggregation, CohortDefinition, CohortStatus, Condition, ConditionKind, Operator,
    PropertyFilter, Rules, RulesOperator, TimeWindow,
};
pub use event::{Event, EventId, EventValue, RawEventRow};
pub use state::{bucket_of, Bucket, PerUserState, BUCKET_SIZE_SECS, STATE_RETENTION_SECS};
pub use transition::{ChangelogRow, CurrentStateRow, MembershipSign, Transition};

use serde::{Deserialize, Serialize};
use std::fmt;

/// 128-bit cohort identifier (spec.md §3: "Identity: `cohort_id` (128-bit)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct CohortId(pub uuid::Uuid);

impl CohortId {
    pub fn new() -> Self {
        CohortId(uuid::Uuid::now_v7())
    }
}

impl Default for CohortId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CohortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User identifier. Kept as an opaque string per spec.md §3 ("`user_id`
/// (string)") rather than a typed ID, since the upstream identity system is
/// out of scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        UserId(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId(s.to_string())
    }
}
