//! Streaming evaluator (spec.md §4.1): consumes events keyed by user,
//! consumes cohort definitions as broadcast state, emits one `Transition`
//! per actual membership change.
//!
//! The evaluator itself is written as a plain synchronous state machine
//! (`EvaluatorShard::process_element`) so that any host runtime — a
//! Flink-style operator, a bare tokio task reading a channel, or a test
//! harness — can drive it without pulling in a specific streaming
//! framework. This mirrors the teacher's separation between
//! `event_processing::windows::WindowType` (pure windowing math) and the
//! operator scaffolding that drives it (`event_processing::operators`).

mod broadcast;
mod checkpoint;
mod metrics;
mod rules_eval;
mod shard;

pub use broadcast::BroadcastDefinitions;
pub use checkpoint::{CheckpointStore, InMemoryCheckpointStore};
pub use metrics::EvaluatorMetrics;
pub use shard::EvaluatorShard;
