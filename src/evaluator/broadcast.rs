use dashmap::DashMap;
use std::sync::Arc;

use crate::model::{CohortDefinition, CohortId, CohortStatus};

/// Cohort definitions replicated in full to every evaluator shard (spec.md
/// §4.1, §5, §9 "Broadcast state vs. local polling").
///
/// Read-only inside `process_element` (spec.md §5); only the
/// broadcast-handler path (`apply_update`/`apply_tombstone`) may mutate it.
/// Grounded in the teacher's pervasive `dashmap` usage for lock-free
/// concurrent maps shared across async tasks (e.g. `src/cache`,
/// `src/concurrent`).
#[derive(Debug, Clone, Default)]
pub struct BroadcastDefinitions {
    inner: Arc<DashMap<CohortId, CohortDefinition>>,
}

impl BroadcastDefinitions {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Applies a definition update (upsert) read from the compacted
    /// `cohort.definitions` topic (spec.md §4.1, §6).
    pub fn apply_update(&self, def: CohortDefinition) {
        self.inner.insert(def.id, def);
    }

    /// Applies a tombstone: a null-valued message for `cohort_id` removes
    /// it from broadcast state entirely (spec.md §4.1 scenario 5).
    pub fn apply_tombstone(&self, cohort_id: CohortId) {
        self.inner.remove(&cohort_id);
    }

    pub fn get(&self, cohort_id: CohortId) -> Option<CohortDefinition> {
        self.inner.get(&cohort_id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Cohorts relevant to `event_name`: active and whose rule set
    /// references it (spec.md §4.1 step 3, "relevance test").
    pub fn relevant_to(&self, event_name: &str) -> Vec<CohortDefinition> {
        self.inner
            .iter()
            .map(|r| r.value().clone())
            .filter(|def| def.status == CohortStatus::Active && def.references_event(event_name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Rules, RulesOperator};
    use chrono::Utc;

    fn cohort(status: CohortStatus, event_name: &str) -> CohortDefinition {
        CohortDefinition {
            id: CohortId::new(),
            name: "test".to_string(),
            description: None,
            status,
            version: 1,
            rules: Rules {
                operator: RulesOperator::And,
                conditions: vec![],
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn tombstone_removes_cohort() {
        let bd = BroadcastDefinitions::new();
        let def = cohort(CohortStatus::Active, "purchase");
        let id = def.id;
        bd.apply_update(def);
        assert!(bd.get(id).is_some());
        bd.apply_tombstone(id);
        assert!(bd.get(id).is_none());
    }

    #[test]
    fn inactive_cohorts_are_not_relevant() {
        let bd = BroadcastDefinitions::new();
        bd.apply_update(cohort(CohortStatus::Inactive, "purchase"));
        assert!(bd.relevant_to("purchase").is_empty());
    }
}
