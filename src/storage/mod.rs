//! Storage contracts (spec.md §4.6): two collapsing-sign tables (current
//! membership; changelog) and a read-only analytical query executor.
//!
//! The analytical store itself is an external collaborator (spec.md §1);
//! these are narrow async traits a real ClickHouse-backed adapter would
//! implement, grounded in the teacher's narrow `SourceConnector`/
//! `SinkConnector` traits (`event_processing::connectors`). `InMemoryStore`
//! is the reference implementation used by tests and the demo binary.

mod contracts;
mod memory;

pub use contracts::{AnalyticalQueryExecutor, ChangelogStore, CurrentStateStore, RawEventStore};
pub use memory::InMemoryStore;
