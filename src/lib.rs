//! Real-time user-cohort membership engine: a streaming evaluator, rule
//! compiler, recompute worker, batched inserter, and transition
//! broadcaster that together answer "is user U in cohort C?" and "which
//! cohorts contain U?" with sub-second freshness.

pub mod broadcaster;
pub mod bus;
pub mod compiler;
pub mod config;
pub mod domain;
pub mod error;
pub mod evaluator;
pub mod inserter;
pub mod model;
pub mod recompute;
pub mod shutdown;
pub mod storage;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use shutdown::Shutdown;
