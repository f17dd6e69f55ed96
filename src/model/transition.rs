use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CohortId, EventId, UserId};

/// Membership sign, restricted to `{-1, +1}` (spec.md §3). Using an enum
/// instead of a bare `i8` makes the invariant `prev_status != new_status`
/// checkable at the type level for the two legal values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i8)]
pub enum MembershipSign {
    Out = -1,
    In = 1,
}

impl MembershipSign {
    pub fn as_i8(self) -> i8 {
        self as i8
    }

    pub fn from_bool(member: bool) -> Self {
        if member {
            MembershipSign::In
        } else {
            MembershipSign::Out
        }
    }

    pub fn flip(self) -> Self {
        match self {
            MembershipSign::In => MembershipSign::Out,
            MembershipSign::Out => MembershipSign::In,
        }
    }
}

/// The central message type: a membership change for one `(cohort, user)`
/// pair (spec.md §3). Invariant: `prev_status != new_status`, enforced by
/// `Transition::new`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub cohort_id: CohortId,
    pub cohort_name: String,
    pub user_id: UserId,
    pub prev_status: MembershipSign,
    pub new_status: MembershipSign,
    pub changed_at: DateTime<Utc>,
    pub trigger_event: Option<EventId>,
}

impl Transition {
    /// Builds a transition, panicking if `prev == new`. Every call site in
    /// this crate only calls this after checking `new != old` (spec.md
    /// §4.1 step 4), so this is an internal invariant, not user input
    /// validation.
    pub fn new(
        cohort_id: CohortId,
        cohort_name: impl Into<String>,
        user_id: UserId,
        prev_status: MembershipSign,
        new_status: MembershipSign,
        changed_at: DateTime<Utc>,
        trigger_event: Option<EventId>,
    ) -> Self {
        debug_assert_ne!(
            prev_status as i8, new_status as i8,
            "transition must change status"
        );
        Self {
            cohort_id,
            cohort_name: cohort_name.into(),
            user_id,
            prev_status,
            new_status,
            changed_at,
            trigger_event,
        }
    }
}

/// Current-state row materialized in the collapsing store (spec.md §3).
/// Logical membership of `(cohort, user)` is "present" iff `sum(sign) > 0`
/// across all rows for that pair (spec.md §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentStateRow {
    pub cohort_id: CohortId,
    pub user_id: UserId,
    pub sign: MembershipSign,
    pub joined_at: DateTime<Utc>,
}

/// Append-only changelog row (spec.md §3), partitioned by month with a
/// 90-day TTL at the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangelogRow {
    pub cohort_id: CohortId,
    pub user_id: UserId,
    pub prev_status: MembershipSign,
    pub new_status: MembershipSign,
    pub changed_at: DateTime<Utc>,
    pub trigger_event_id: Option<EventId>,
}

impl From<&Transition> for ChangelogRow {
    fn from(t: &Transition) -> Self {
        ChangelogRow {
            cohort_id: t.cohort_id,
            user_id: t.user_id.clone(),
            prev_status: t.prev_status,
            new_status: t.new_status,
            changed_at: t.changed_at,
            trigger_event_id: t.trigger_event,
        }
    }
}

impl From<&Transition> for CurrentStateRow {
    fn from(t: &Transition) -> Self {
        // spec.md §4.4 step 1: a zero instant (e.g. a deserialized default)
        // falls back to now rather than recording an epoch join time.
        let joined_at = if t.changed_at == DateTime::<Utc>::default() {
            Utc::now()
        } else {
            t.changed_at
        };
        CurrentStateRow {
            cohort_id: t.cohort_id,
            user_id: t.user_id.clone(),
            sign: t.new_status,
            joined_at,
        }
    }
}
