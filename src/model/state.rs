use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::{CohortId, Event};

/// Width of a streaming aggregation bucket (spec.md §3: "Bucket size: 60 s").
pub const BUCKET_SIZE_SECS: i64 = 60;

/// Retention window for per-user streaming state (spec.md §3: "Retention:
/// 90 days of buckets").
pub const STATE_RETENTION_SECS: i64 = 90 * 24 * 3_600;

/// A 60-second half-open interval, identified by its index since the Unix
/// epoch (spec.md GLOSSARY: "Bucket").
pub type Bucket = i64;

pub fn bucket_of(ts: DateTime<Utc>) -> Bucket {
    ts.timestamp().div_euclid(BUCKET_SIZE_SECS)
}

/// Per-user streaming state held by the evaluator, keyed by `user_id`
/// (spec.md §3). Owned exclusively by the shard that hashes to this user;
/// no cross-shard access occurs (spec.md §5).
#[derive(Debug, Default, Clone)]
pub struct PerUserState {
    last_event_ts: HashMap<String, DateTime<Utc>>,
    count: HashMap<(String, Bucket), u64>,
    sum: HashMap<(String, String, Bucket), f64>,
    membership: HashMap<CohortId, bool>,
}

impl PerUserState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies event `e`'s counters and timestamps (spec.md §4.1 step 1).
    pub fn record_event(&mut self, e: &Event) {
        let bucket = bucket_of(e.timestamp);
        *self
            .count
            .entry((e.event_name.clone(), bucket))
            .or_insert(0) += 1;

        for (prop, value) in &e.properties {
            if let Some(num) = value.as_f64() {
                *self
                    .sum
                    .entry((e.event_name.clone(), prop.clone(), bucket))
                    .or_insert(0.0) += num;
            }
        }

        self.last_event_ts.insert(e.event_name.clone(), e.timestamp);
    }

    /// Evicts buckets older than `now - 90d` (spec.md §4.1 step 2).
    pub fn evict_before(&mut self, now: DateTime<Utc>) {
        let cutoff = bucket_of(now) - STATE_RETENTION_SECS / BUCKET_SIZE_SECS;
        self.count.retain(|(_, bucket), _| *bucket >= cutoff);
        self.sum.retain(|(_, _, bucket), _| *bucket >= cutoff);
    }

    pub fn bucket_count(&self) -> usize {
        self.count.len() + self.sum.len()
    }

    pub fn last_event_ts(&self, event_name: &str) -> Option<DateTime<Utc>> {
        self.last_event_ts.get(event_name).copied()
    }

    /// Folds `count` over `[start_bucket, end_bucket]` inclusive (spec.md
    /// §4.1 step 3, aggregate condition).
    pub fn count_in_range(&self, event_name: &str, start_bucket: Bucket, end_bucket: Bucket) -> u64 {
        self.count
            .iter()
            .filter(|((name, bucket), _)| {
                name == event_name && *bucket >= start_bucket && *bucket <= end_bucket
            })
            .map(|(_, v)| *v)
            .sum()
    }

    /// Folds `sum` over `[start_bucket, end_bucket]` inclusive for a given
    /// numeric property field.
    pub fn sum_in_range(
        &self,
        event_name: &str,
        field: &str,
        start_bucket: Bucket,
        end_bucket: Bucket,
    ) -> f64 {
        self.sum
            .iter()
            .filter(|((name, f, bucket), _)| {
                name == event_name && f == field && *bucket >= start_bucket && *bucket <= end_bucket
            })
            .map(|(_, v)| *v)
            .sum()
    }

    pub fn membership(&self, cohort_id: CohortId) -> bool {
        self.membership.get(&cohort_id).copied().unwrap_or(false)
    }

    pub fn set_membership(&mut self, cohort_id: CohortId, member: bool) {
        self.membership.insert(cohort_id, member);
    }

    pub fn remove_cohort(&mut self, cohort_id: CohortId) {
        self.membership.remove(&cohort_id);
    }
}
