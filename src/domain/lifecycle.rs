use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use crate::bus::{DefinitionRecord, EventBus};
use crate::error::Result;
use crate::model::{CohortDefinition, CohortStatus, MembershipSign, Transition};
use crate::recompute::RecomputeWorker;
use crate::storage::{AnalyticalQueryExecutor, ChangelogStore, CurrentStateStore};

/// Domain-level coordination around a cohort's lifecycle transitions
/// (spec.md §3 "Lifecycle", §4.3's first-activation hook). The CRUD HTTP
/// layer that would call these methods is out of scope; this is the
/// coordination logic it would call.
pub struct CohortLifecycle<B, Q, C, L> {
    bus: Arc<B>,
    recompute: Arc<RecomputeWorker<Q, C, L>>,
    current_state: Arc<C>,
}

impl<B, Q, C, L> CohortLifecycle<B, Q, C, L>
where
    B: EventBus,
    Q: AnalyticalQueryExecutor,
    C: CurrentStateStore,
    L: ChangelogStore,
{
    pub fn new(bus: Arc<B>, recompute: Arc<RecomputeWorker<Q, C, L>>, current_state: Arc<C>) -> Self {
        Self {
            bus,
            recompute,
            current_state,
        }
    }

    /// Moves a draft cohort to active, publishes the updated definition,
    /// and enqueues its first recompute onto the worker's bounded job
    /// queue (spec.md §3: "on first transition to active a recompute is
    /// scheduled"; §4.3: "the domain layer asynchronously invokes
    /// TriggerRecompute"). Returns once the job is queued, not once it has
    /// run.
    #[instrument(skip(self, cohort), fields(cohort_id = %cohort.id))]
    pub async fn activate(&self, cohort: &mut CohortDefinition) -> Result<()> {
        cohort.status = CohortStatus::Active;
        cohort.updated_at = Utc::now();

        self.bus
            .publish_definition(DefinitionRecord {
                cohort_id: cohort.id,
                definition: Some(cohort.clone()),
            })
            .await?;

        self.recompute.trigger(cohort).await?;
        Ok(())
    }

    /// Tombstones a cohort: publishes a null-valued definition record and
    /// enqueues a removal transition for every currently present member
    /// (spec.md §3: "deletion produces a tombstone that removes all
    /// memberships").
    #[instrument(skip(self, cohort), fields(cohort_id = %cohort.id))]
    pub async fn delete(&self, cohort: &CohortDefinition) -> Result<()> {
        self.bus
            .publish_definition(DefinitionRecord {
                cohort_id: cohort.id,
                definition: None,
            })
            .await?;

        let members = self.current_state.present_members(cohort.id).await?;
        let now = Utc::now();
        for user_id in members {
            let transition = Transition::new(
                cohort.id,
                cohort.name.clone(),
                user_id,
                MembershipSign::In,
                MembershipSign::Out,
                now,
                None,
            );
            self.bus.publish_transition(transition).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusConsumer, InMemoryBus};
    use crate::compiler::CompiledQuery;
    use crate::model::{Condition, ConditionKind, CurrentStateRow, Rules, RulesOperator, UserId};
    use crate::storage::InMemoryStore;
    use async_trait::async_trait;
    use std::collections::HashSet;

    struct EmptyExecutor;

    #[async_trait]
    impl AnalyticalQueryExecutor for EmptyExecutor {
        async fn execute(&self, _query: &CompiledQuery) -> Result<HashSet<UserId>> {
            Ok(HashSet::new())
        }
    }

    fn draft_cohort() -> CohortDefinition {
        CohortDefinition {
            id: crate::model::CohortId::new(),
            name: "lifecycle-target".into(),
            description: None,
            status: CohortStatus::Draft,
            version: 1,
            rules: Rules {
                operator: RulesOperator::And,
                conditions: vec![Condition {
                    kind: ConditionKind::Event,
                    event_name: "signed_up".into(),
                    property_name: None,
                    aggregation: None,
                    aggregation_field: None,
                    time_window: None,
                    operator: String::new(),
                    value: serde_json::Value::Null,
                    property_filters: vec![],
                }],
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn activate_publishes_definition_and_enqueues_recompute() {
        let bus = Arc::new(InMemoryBus::new());
        let current_state = Arc::new(InMemoryStore::new());
        let changelog = Arc::new(InMemoryStore::new());
        let executor = Arc::new(EmptyExecutor);
        let recompute = Arc::new(RecomputeWorker::new(executor, current_state.clone(), changelog));
        let drain = recompute.clone().spawn_drain();

        let mut definitions = bus.subscribe_definitions().await;
        let lifecycle = CohortLifecycle::new(bus.clone(), recompute, current_state);

        let mut cohort = draft_cohort();
        lifecycle.activate(&mut cohort).await.unwrap();

        assert_eq!(cohort.status, CohortStatus::Active);
        let record = definitions.fetch().await.unwrap().unwrap();
        assert!(record.definition.is_some());

        drain.abort();
    }

    #[tokio::test]
    async fn delete_tombstones_and_removes_every_present_member() {
        let bus = Arc::new(InMemoryBus::new());
        let current_state = Arc::new(InMemoryStore::new());
        let changelog = Arc::new(InMemoryStore::new());
        let executor = Arc::new(EmptyExecutor);
        let recompute = Arc::new(RecomputeWorker::new(executor, current_state.clone(), changelog));

        let cohort = draft_cohort();
        CurrentStateStore::insert_batch(
            &*current_state,
            vec![CurrentStateRow {
                cohort_id: cohort.id,
                user_id: UserId::from("u1"),
                sign: MembershipSign::In,
                joined_at: Utc::now(),
            }],
        )
        .await
        .unwrap();

        let mut definitions = bus.subscribe_definitions().await;
        let mut transitions = bus.subscribe_transitions().await;

        let lifecycle = CohortLifecycle::new(bus.clone(), recompute, current_state);
        lifecycle.delete(&cohort).await.unwrap();

        let record = definitions.fetch().await.unwrap().unwrap();
        assert!(record.definition.is_none());

        let transition = transitions.fetch().await.unwrap().unwrap();
        assert_eq!(transition.user_id, UserId::from("u1"));
        assert_eq!(transition.new_status, MembershipSign::Out);
    }
}
