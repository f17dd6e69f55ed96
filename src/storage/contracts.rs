use async_trait::async_trait;
use std::collections::HashSet;

use crate::compiler::CompiledQuery;
use crate::error::Result;
use crate::model::{ChangelogRow, CohortId, CurrentStateRow, RawEventRow, UserId};

/// Current-state table: `(cohort_id, user_id, sign, joined_at)`, ordered by
/// `(cohort_id, user_id)` (spec.md §3, §4.6). Readers must always aggregate
/// with `sum(sign) > 0`, never rely on row identity (spec.md §9).
#[async_trait]
pub trait CurrentStateStore: Send + Sync {
    /// Appends `rows` as a single logical batch (spec.md §4.4 step 1).
    /// Duplicates collapse idempotently under retry (spec.md §1
    /// Non-goals).
    async fn insert_batch(&self, rows: Vec<CurrentStateRow>) -> Result<()>;

    /// Present members of `cohort_id`: every `user_id` with `sum(sign) > 0`
    /// (spec.md §4.6, §9 "must therefore use HAVING sum(sign) > 0, not
    /// HAVING sum(sign) = 1").
    async fn present_members(&self, cohort_id: CohortId) -> Result<HashSet<UserId>>;

    /// Point-in-time membership query (spec.md §1: "is user U in cohort
    /// C?").
    async fn is_member(&self, cohort_id: CohortId, user_id: &UserId) -> Result<bool>;

    /// "which cohorts contain U?" (spec.md §1).
    async fn cohorts_for_user(&self, user_id: &UserId) -> Result<HashSet<CohortId>>;

    /// "how many members in C?" (spec.md §1).
    async fn member_count(&self, cohort_id: CohortId) -> Result<usize>;
}

/// Append-only changelog, partitioned by month with a 90-day TTL at the
/// real store (spec.md §3, §4.6).
#[async_trait]
pub trait ChangelogStore: Send + Sync {
    async fn insert_batch(&self, rows: Vec<ChangelogRow>) -> Result<()>;
}

/// Executes a compiled rule query against the analytical store (spec.md
/// §4.2's `BuildQuery` output, consumed by §4.3 step 4).
#[async_trait]
pub trait AnalyticalQueryExecutor: Send + Sync {
    async fn execute(&self, query: &CompiledQuery) -> Result<HashSet<UserId>>;
}

/// Raw `events` table, TTL'd at 365 days (spec.md §6 config surface).
/// Written by the batched inserter's event writer (spec.md §4.4); read by
/// the analytical query executor's underlying engine, which this crate
/// does not implement.
#[async_trait]
pub trait RawEventStore: Send + Sync {
    async fn insert_batch(&self, rows: Vec<RawEventRow>) -> Result<()>;
}
