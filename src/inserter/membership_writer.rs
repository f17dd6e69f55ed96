use std::sync::Arc;

use crate::error::Result;
use crate::model::{ChangelogRow, CurrentStateRow, Transition};
use crate::storage::{ChangelogStore, CurrentStateStore};

/// Persists a batch of transitions to both collapsing-sign tables
/// (spec.md §4.4 "Membership writer"). Errors abort the remainder of the
/// batch; rows already sent are never retracted, since the collapsing
/// model tolerates duplicates.
pub struct MembershipWriter<C, L> {
    current_state: Arc<C>,
    changelog: Arc<L>,
}

impl<C, L> MembershipWriter<C, L>
where
    C: CurrentStateStore,
    L: ChangelogStore,
{
    pub fn new(current_state: Arc<C>, changelog: Arc<L>) -> Self {
        Self {
            current_state,
            changelog,
        }
    }

    pub async fn write_batch(&self, transitions: Vec<Transition>) -> Result<()> {
        if transitions.is_empty() {
            return Ok(());
        }

        let current_rows: Vec<CurrentStateRow> =
            transitions.iter().map(CurrentStateRow::from).collect();
        self.current_state.insert_batch(current_rows).await?;

        let changelog_rows: Vec<ChangelogRow> =
            transitions.iter().map(ChangelogRow::from).collect();
        self.changelog.insert_batch(changelog_rows).await?;

        Ok(())
    }
}
