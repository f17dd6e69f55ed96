use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::error::Result;
use crate::model::{ChangelogRow, CohortId, CurrentStateRow, RawEventRow, UserId};

use super::contracts::{ChangelogStore, CurrentStateStore, RawEventStore};

/// Reference implementation of the two collapsing-sign tables, backed by
/// `dashmap` (grounded in the teacher's pervasive use of `dashmap` for
/// concurrent maps, e.g. `src/cache`). Rows are appended, never mutated or
/// deleted: membership is always derived by summing signs, exactly as the
/// real analytical store would (spec.md §4.6, §9).
#[derive(Debug, Default)]
pub struct InMemoryStore {
    current_state: DashMap<(CohortId, UserId), Vec<i8>>,
    changelog: Mutex<Vec<ChangelogRow>>,
    raw_events: Mutex<Vec<RawEventRow>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn changelog_len(&self) -> usize {
        self.changelog.lock().unwrap().len()
    }

    pub fn raw_event_count(&self) -> usize {
        self.raw_events.lock().unwrap().len()
    }
}

#[async_trait]
impl CurrentStateStore for InMemoryStore {
    async fn insert_batch(&self, rows: Vec<CurrentStateRow>) -> Result<()> {
        for row in rows {
            self.current_state
                .entry((row.cohort_id, row.user_id))
                .or_default()
                .push(row.sign.as_i8());
        }
        Ok(())
    }

    async fn present_members(&self, cohort_id: CohortId) -> Result<HashSet<UserId>> {
        Ok(self
            .current_state
            .iter()
            .filter(|entry| entry.key().0 == cohort_id)
            .filter(|entry| entry.value().iter().map(|s| *s as i64).sum::<i64>() > 0)
            .map(|entry| entry.key().1.clone())
            .collect())
    }

    async fn is_member(&self, cohort_id: CohortId, user_id: &UserId) -> Result<bool> {
        Ok(self
            .current_state
            .get(&(cohort_id, user_id.clone()))
            .map(|signs| signs.iter().map(|s| *s as i64).sum::<i64>() > 0)
            .unwrap_or(false))
    }

    async fn cohorts_for_user(&self, user_id: &UserId) -> Result<HashSet<CohortId>> {
        Ok(self
            .current_state
            .iter()
            .filter(|entry| &entry.key().1 == user_id)
            .filter(|entry| entry.value().iter().map(|s| *s as i64).sum::<i64>() > 0)
            .map(|entry| entry.key().0)
            .collect())
    }

    async fn member_count(&self, cohort_id: CohortId) -> Result<usize> {
        Ok(self.present_members(cohort_id).await?.len())
    }
}

#[async_trait]
impl ChangelogStore for InMemoryStore {
    async fn insert_batch(&self, rows: Vec<ChangelogRow>) -> Result<()> {
        self.changelog.lock().unwrap().extend(rows);
        Ok(())
    }
}

#[async_trait]
impl RawEventStore for InMemoryStore {
    async fn insert_batch(&self, rows: Vec<RawEventRow>) -> Result<()> {
        self.raw_events.lock().unwrap().extend(rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MembershipSign;
    use chrono::Utc;

    #[tokio::test]
    async fn idempotent_collapse_sums_to_zero_or_one() {
        let store = InMemoryStore::new();
        let cohort = CohortId::new();
        let user = UserId::from("u1");

        CurrentStateStore::insert_batch(
            &store,
            vec![CurrentStateRow {
                cohort_id: cohort,
                user_id: user.clone(),
                sign: MembershipSign::In,
                joined_at: Utc::now(),
            }],
        )
        .await
        .unwrap();
        assert!(store.is_member(cohort, &user).await.unwrap());

        CurrentStateStore::insert_batch(
            &store,
            vec![CurrentStateRow {
                cohort_id: cohort,
                user_id: user.clone(),
                sign: MembershipSign::Out,
                joined_at: Utc::now(),
            }],
        )
        .await
        .unwrap();
        assert!(!store.is_member(cohort, &user).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_entries_still_collapse_to_present() {
        let store = InMemoryStore::new();
        let cohort = CohortId::new();
        let user = UserId::from("u1");

        for _ in 0..3 {
            CurrentStateStore::insert_batch(
                &store,
                vec![CurrentStateRow {
                    cohort_id: cohort,
                    user_id: user.clone(),
                    sign: MembershipSign::In,
                    joined_at: Utc::now(),
                }],
            )
            .await
            .unwrap();
        }

        assert!(store.is_member(cohort, &user).await.unwrap());
    }
}
