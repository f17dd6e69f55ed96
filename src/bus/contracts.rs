use async_trait::async_trait;

use crate::error::Result;
use crate::model::{CohortDefinition, CohortId, Event, Transition};

/// One assigned partition's fetch/commit cycle (spec.md §4.4 "Consumer
/// loop"; promoted here since every bus-backed consumer in this crate --
/// the evaluator, the inserter, the broadcaster's source -- shares it).
/// Grounded in the teacher's `event_processing::connectors::SourceConnector`
/// trait (`poll`, `commit`).
#[async_trait]
pub trait BusConsumer: Send {
    type Message: Send;

    /// `None` means "nothing ready right now, try again".
    async fn fetch(&mut self) -> Result<Option<Self::Message>>;

    /// Commits the most recently fetched message's offset.
    async fn commit(&mut self) -> Result<()>;
}

/// A definitions-topic record: `Some(definition)` for an upsert, `None`
/// for a tombstone (spec.md §6 "value = JSON cohort definition, or null
/// for a tombstone").
#[derive(Debug, Clone)]
pub struct DefinitionRecord {
    pub cohort_id: CohortId,
    pub definition: Option<CohortDefinition>,
}

/// The three topics of spec.md §6, expressed as a publish/subscribe
/// contract so this crate never depends on a concrete broker client.
/// Grounded in the teacher's `event_processing::connectors`
/// `SourceConnector`/`SinkConnector` split.
#[async_trait]
pub trait EventBus: Send + Sync {
    type EventConsumer: BusConsumer<Message = Event>;
    type DefinitionConsumer: BusConsumer<Message = DefinitionRecord>;
    type TransitionConsumer: BusConsumer<Message = Transition>;

    async fn publish_event(&self, event: Event) -> Result<()>;
    async fn publish_definition(&self, record: DefinitionRecord) -> Result<()>;
    async fn publish_transition(&self, transition: Transition) -> Result<()>;

    async fn subscribe_events(&self) -> Self::EventConsumer;
    async fn subscribe_definitions(&self) -> Self::DefinitionConsumer;
    async fn subscribe_transitions(&self) -> Self::TransitionConsumer;
}
