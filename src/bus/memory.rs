use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::error::{EngineError, Result};
use crate::model::{CohortDefinition, CohortId, Event, Transition};

use super::contracts::{BusConsumer, DefinitionRecord, EventBus};

/// In-memory stand-in for the three bus topics (spec.md §6), backed by
/// `tokio::sync::mpsc` for `events.raw`/`cohort.membership` and a
/// `dashmap`-backed compacted snapshot for `cohort.definitions` so every
/// subscriber replays the full log from "earliest" the way a real
/// log-compacted topic would (spec.md §6). Intended for integration tests
/// and the demo binary, not production use: `events.raw` and
/// `cohort.membership` support exactly one live consumer each, since this
/// crate never needs more than one per topic.
pub struct InMemoryBus {
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
    transitions_tx: mpsc::UnboundedSender<Transition>,
    transitions_rx: Mutex<Option<mpsc::UnboundedReceiver<Transition>>>,
    definitions: DashMap<CohortId, Option<CohortDefinition>>,
    definition_subscribers: Mutex<Vec<mpsc::UnboundedSender<DefinitionRecord>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (transitions_tx, transitions_rx) = mpsc::unbounded_channel();
        Self {
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            transitions_tx,
            transitions_rx: Mutex::new(Some(transitions_rx)),
            definitions: DashMap::new(),
            definition_subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct UnboundedConsumer<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

#[async_trait]
impl<T: Send> BusConsumer for UnboundedConsumer<T> {
    type Message = T;

    async fn fetch(&mut self) -> Result<Option<T>> {
        Ok(self.rx.recv().await)
    }

    async fn commit(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    type EventConsumer = UnboundedConsumer<Event>;
    type DefinitionConsumer = UnboundedConsumer<DefinitionRecord>;
    type TransitionConsumer = UnboundedConsumer<Transition>;

    async fn publish_event(&self, event: Event) -> Result<()> {
        self.events_tx
            .send(event)
            .map_err(|_| EngineError::Bus("events.raw has no live consumer".into()))
    }

    async fn publish_definition(&self, record: DefinitionRecord) -> Result<()> {
        self.definitions.insert(record.cohort_id, record.definition.clone());
        let subscribers = self.definition_subscribers.lock().unwrap();
        for tx in subscribers.iter() {
            let _ = tx.send(record.clone());
        }
        Ok(())
    }

    async fn publish_transition(&self, transition: Transition) -> Result<()> {
        self.transitions_tx
            .send(transition)
            .map_err(|_| EngineError::Bus("cohort.membership has no live consumer".into()))
    }

    async fn subscribe_events(&self) -> Self::EventConsumer {
        let rx = self
            .events_rx
            .lock()
            .unwrap()
            .take()
            .expect("events.raw already has a consumer");
        UnboundedConsumer { rx }
    }

    async fn subscribe_definitions(&self) -> Self::DefinitionConsumer {
        let (tx, rx) = mpsc::unbounded_channel();
        for entry in self.definitions.iter() {
            let record = DefinitionRecord {
                cohort_id: *entry.key(),
                definition: entry.value().clone(),
            };
            let _ = tx.send(record);
        }
        self.definition_subscribers.lock().unwrap().push(tx);
        UnboundedConsumer { rx }
    }

    async fn subscribe_transitions(&self) -> Self::TransitionConsumer {
        let rx = self
            .transitions_rx
            .lock()
            .unwrap()
            .take()
            .expect("cohort.membership already has a consumer");
        UnboundedConsumer { rx }
    }
}
