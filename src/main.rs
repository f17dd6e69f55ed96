//! Demo wiring of the cohort engine's components over the in-memory bus
//! and storage reference implementations. A production deployment
//! replaces `InMemoryBus` with a Kafka-backed `EventBus` and
//! `InMemoryStore` with a ClickHouse-backed storage trio; neither is in
//! scope for this crate.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cohort_engine::broadcaster::Broadcaster;
use cohort_engine::bus::{BusConsumer, EventBus, InMemoryBus};
use cohort_engine::compiler::CompiledQuery;
use cohort_engine::domain::CohortLifecycle;
use cohort_engine::error::Result;
use cohort_engine::evaluator::{BroadcastDefinitions, EvaluatorShard};
use cohort_engine::inserter::{run_consumer_loop, Batcher, EventWriter, MembershipWriter};
use cohort_engine::model::{Event, Transition, UserId};
use cohort_engine::recompute::RecomputeWorker;
use cohort_engine::storage::{AnalyticalQueryExecutor, InMemoryStore};
use cohort_engine::{EngineConfig, Shutdown};

/// Stand-in for the ClickHouse-backed analytical query executor, which
/// this crate does not implement: the analytical store is an external
/// collaborator. Always reports an empty authoritative set.
struct NullQueryExecutor;

#[async_trait]
impl AnalyticalQueryExecutor for NullQueryExecutor {
    async fn execute(&self, _query: &CompiledQuery) -> Result<HashSet<UserId>> {
        Ok(HashSet::new())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::default();
    let shutdown = Shutdown::new(config.shutdown_drain_timeout);

    let bus = Arc::new(InMemoryBus::new());
    let store = Arc::new(InMemoryStore::new());
    let query_executor = Arc::new(NullQueryExecutor);

    let recompute = Arc::new(RecomputeWorker::new(
        query_executor,
        store.clone(),
        store.clone(),
    ));
    recompute.clone().spawn_drain();
    let _lifecycle = CohortLifecycle::new(bus.clone(), recompute, store.clone());

    let broadcast_defs = BroadcastDefinitions::new();
    spawn_definition_listener(bus.clone(), broadcast_defs.clone(), shutdown.token());

    let broadcaster = Broadcaster::spawn();

    let membership_writer = Arc::new(MembershipWriter::new(store.clone(), store.clone()));
    let membership_batcher = {
        let writer = membership_writer.clone();
        Arc::new(Batcher::new(
            config.batch_size,
            config.flush_interval,
            Arc::new(move |items: Vec<Transition>| {
                let writer = writer.clone();
                Box::pin(async move { writer.write_batch(items).await })
            }),
        ))
    };

    let event_writer = Arc::new(EventWriter::new(store.clone()));
    let event_batcher = {
        let writer = event_writer.clone();
        Arc::new(Batcher::new(
            config.batch_size,
            config.flush_interval,
            Arc::new(move |items: Vec<Event>| {
                let writer = writer.clone();
                Box::pin(async move { writer.write_batch(items).await })
            }),
        ))
    };

    spawn_event_pipeline(
        bus.clone(),
        broadcast_defs,
        event_batcher.clone(),
        shutdown.token(),
    );
    spawn_membership_pipeline(
        bus.clone(),
        membership_batcher.clone(),
        broadcaster,
        shutdown.token(),
    );

    shutdown.listen().await;

    shutdown
        .drain(async {
            let _ = membership_batcher.stop().await;
            let _ = event_batcher.stop().await;
        })
        .await;
}

/// Applies `cohort.definitions` updates/tombstones to the evaluator's
/// broadcast state (spec.md §4.1 "broadcast source").
fn spawn_definition_listener(
    bus: Arc<InMemoryBus>,
    broadcast_defs: BroadcastDefinitions,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut consumer = bus.subscribe_definitions().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                fetched = consumer.fetch() => match fetched {
                    Ok(Some(record)) => match record.definition {
                        Some(def) => broadcast_defs.apply_update(def),
                        None => broadcast_defs.apply_tombstone(record.cohort_id),
                    },
                    Ok(None) => continue,
                    Err(err) => tracing::warn!(error = %err, "definition fetch failed"),
                },
            }
        }
    });
}

/// Drives `events.raw` through a single evaluator shard, publishing the
/// transitions it emits to `cohort.membership` and queuing the raw event
/// for archival. A real deployment runs many shards behind a stream
/// processing runtime (spec.md §5); `InMemoryBus` supports only one live
/// consumer per topic, so this demo folds the evaluator's and the event
/// writer's independent consumer groups into a single loop.
fn spawn_event_pipeline(
    bus: Arc<InMemoryBus>,
    broadcast_defs: BroadcastDefinitions,
    event_batcher: Arc<Batcher<Event>>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut shard = EvaluatorShard::new(0, 1, broadcast_defs);
        let mut consumer = bus.subscribe_events().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                fetched = consumer.fetch() => match fetched {
                    Ok(Some(event)) => {
                        for transition in shard.process_element(&event) {
                            let _ = bus.publish_transition(transition).await;
                        }
                        if let Err(err) = event_batcher.add(event).await {
                            tracing::warn!(error = %err, "event archival failed");
                        }
                    }
                    Ok(None) => continue,
                    Err(err) => tracing::warn!(error = %err, "event fetch failed"),
                },
            }
        }
    });
}

/// Drives `cohort.membership` to both the broadcaster and the
/// materialized-state batcher (spec.md §4.4, §4.5).
fn spawn_membership_pipeline(
    bus: Arc<InMemoryBus>,
    membership_batcher: Arc<Batcher<Transition>>,
    broadcaster: Broadcaster,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let consumer = bus.subscribe_transitions().await;
        let _ = run_consumer_loop(
            consumer,
            Ok,
            move |transition: Transition| {
                let batcher = membership_batcher.clone();
                let broadcaster = broadcaster.clone();
                Box::pin(async move {
                    broadcaster.broadcast(transition.clone());
                    batcher.add(transition).await
                })
            },
            shutdown,
        )
        .await;
    });
}
