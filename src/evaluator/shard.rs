use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::debug;

use crate::model::{CohortId, Event, MembershipSign, PerUserState, Transition, UserId};

use super::broadcast::BroadcastDefinitions;
use super::metrics::EvaluatorMetrics;
use super::rules_eval::evaluate_rules;

/// Hashes `user_id` to one of `num_shards` partitions (spec.md §4.1
/// "Scheduling model": "Parallel, sharded by `user_id` hash"). Shards
/// never communicate and never access each other's state (spec.md §5).
pub fn shard_for(user_id: &UserId, num_shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    user_id.hash(&mut hasher);
    (hasher.finish() as usize) % num_shards.max(1)
}

/// One parallel partition of the streaming evaluator (spec.md §4.1). Owns
/// the per-user state for every user hashing to this shard; the cohort
/// broadcast stream is replicated to it in full.
pub struct EvaluatorShard {
    shard_id: usize,
    num_shards: usize,
    state: HashMap<UserId, PerUserState>,
    broadcast: BroadcastDefinitions,
    metrics: Arc<EvaluatorMetrics>,
}

impl EvaluatorShard {
    pub fn new(shard_id: usize, num_shards: usize, broadcast: BroadcastDefinitions) -> Self {
        Self {
            shard_id,
            num_shards,
            state: HashMap::new(),
            broadcast,
            metrics: EvaluatorMetrics::new(),
        }
    }

    pub fn metrics(&self) -> Arc<EvaluatorMetrics> {
        self.metrics.clone()
    }

    /// True if `user_id` hashes to this shard. The host runtime is
    /// expected to route events accordingly; `process_element` does not
    /// check this itself so that single-shard test harnesses can drive it
    /// directly.
    pub fn owns(&self, user_id: &UserId) -> bool {
        shard_for(user_id, self.num_shards) == self.shard_id
    }

    /// Runs spec.md §4.1's algorithm for one event, returning every
    /// transition it produces (normally zero or one per relevant cohort,
    /// never more than one per cohort per call).
    pub fn process_element(&mut self, event: &Event) -> Vec<Transition> {
        self.metrics.record_event();

        let user_state = self.state.entry(event.user_id.clone()).or_default();
        user_state.record_event(event);

        let buckets_before = user_state.bucket_count();
        user_state.evict_before(event.timestamp);
        if user_state.bucket_count() < buckets_before {
            self.metrics.record_eviction();
        }

        let mut transitions = Vec::new();
        for cohort in self.broadcast.relevant_to(&event.event_name) {
            self.metrics.record_condition_evaluated();

            let combined = evaluate_rules(&cohort.rules, user_state, event.timestamp);
            let new_sign = MembershipSign::from_bool(combined);
            let old_member = user_state.membership(cohort.id);
            let old_sign = MembershipSign::from_bool(old_member);

            if new_sign.as_i8() == old_sign.as_i8() {
                continue;
            }

            user_state.set_membership(cohort.id, combined);

            debug!(
                shard = self.shard_id,
                cohort = %cohort.id,
                user = %event.user_id,
                from = old_sign.as_i8(),
                to = new_sign.as_i8(),
                "membership transition"
            );

            transitions.push(Transition::new(
                cohort.id,
                cohort.name.clone(),
                event.user_id.clone(),
                old_sign,
                new_sign,
                event.timestamp,
                Some(event.id),
            ));
            self.metrics.record_transition();
        }

        transitions
    }

    /// Drops broadcast-state bookkeeping for a tombstoned cohort from
    /// every tracked user (spec.md §4.1 scenario 5). The host calls this
    /// from the broadcast-handler path, never from `process_element`.
    pub fn forget_cohort(&mut self, cohort_id: CohortId) {
        for state in self.state.values_mut() {
            state.remove_cohort(cohort_id);
        }
    }

    pub fn tracked_users(&self) -> usize {
        self.state.len()
    }
}
