//! Event and definition bus contracts (spec.md §6's three topics,
//! expressed as traits rather than a concrete broker client since the bus
//! itself is out of scope). `InMemoryBus` backs integration tests that
//! exercise the full evaluator -> inserter -> broadcaster pipeline
//! without a real Kafka cluster.

mod contracts;
mod memory;

pub use contracts::{BusConsumer, DefinitionRecord, EventBus};
pub use memory::InMemoryBus;
