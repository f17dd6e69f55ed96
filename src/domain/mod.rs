//! Domain orchestration (spec.md §3's lifecycle rules plus §4.3's
//! first-activation hook): the coordination logic a CRUD HTTP layer would
//! call, without the transport itself.

mod lifecycle;

pub use lifecycle::CohortLifecycle;
