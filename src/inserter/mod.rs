//! Batched inserter (spec.md §4.4): consumes the transition and raw-event
//! streams and persists them into the analytical store with batching,
//! retry-safe writes, and a final flush on shutdown.

mod batcher;
mod consumer;
mod event_writer;
mod membership_writer;

pub use batcher::{Batcher, FlushFn, DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_SIZE};
pub use consumer::run_consumer_loop;
pub use event_writer::EventWriter;
pub use membership_writer::MembershipWriter;
