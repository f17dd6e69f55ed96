use std::sync::Arc;

use crate::error::Result;
use crate::model::{Event, RawEventRow};
use crate::storage::RawEventStore;

/// Persists a batch of raw events (spec.md §4.4 "Event writer").
/// `properties` is serialized to a JSON string; an event with no
/// properties is stored as `"{}"`.
pub struct EventWriter<S> {
    store: Arc<S>,
}

impl<S: RawEventStore> EventWriter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn write_batch(&self, events: Vec<Event>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let rows: Vec<RawEventRow> = events.iter().map(RawEventRow::from).collect();
        self.store.insert_batch(rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserId;
    use crate::storage::InMemoryStore;
    use chrono::Utc;

    #[tokio::test]
    async fn writes_events_with_empty_properties_as_empty_object() {
        let store = Arc::new(InMemoryStore::new());
        let writer = EventWriter::new(store.clone());

        let event = Event {
            id: Default::default(),
            user_id: UserId::from("u1"),
            event_name: "purchase".to_string(),
            properties: Default::default(),
            timestamp: Utc::now(),
            received_at: Utc::now(),
        };

        writer.write_batch(vec![event]).await.unwrap();
        assert_eq!(store.raw_event_count(), 1);
    }
}
