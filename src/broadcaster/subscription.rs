use std::collections::HashSet;
use std::fmt;

use crate::model::{CohortId, Transition, UserId};

/// Unique handle for one subscriber (spec.md §4.5 `Subscribe(id, ...)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub uuid::Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        SubscriberId(uuid::Uuid::now_v7())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Optional cohort/user filters applied conjunctively (spec.md §4.5
/// "Subscription filter"). An absent set matches everything.
#[derive(Debug, Clone, Default)]
pub struct Subscription {
    pub cohort_ids: Option<HashSet<CohortId>>,
    pub user_ids: Option<HashSet<UserId>>,
}

impl Subscription {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, transition: &Transition) -> bool {
        if let Some(cohort_ids) = &self.cohort_ids {
            if !cohort_ids.contains(&transition.cohort_id) {
                return false;
            }
        }
        if let Some(user_ids) = &self.user_ids {
            if !user_ids.contains(&transition.user_id) {
                return false;
            }
        }
        true
    }
}
