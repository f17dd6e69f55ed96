//! Rule-to-query compiler (spec.md §4.2): translates a `Rules` value into a
//! parameterized analytical query whose result is the set of `user_id`s
//! currently matching the rule.
//!
//! Grounded in the teacher's `parser::SqlParser` (src/parser/mod.rs): a
//! thin wrapper type holding configuration, a typed error enum instead of
//! stringly-typed errors, and a `#[cfg(test)]` module exercising the public
//! surface directly. Unlike the teacher's parser, this compiler only ever
//! *emits* SQL text — it never parses untrusted SQL, so no injection-
//! prevention layer is needed; all literals are passed as positional
//! parameters, never interpolated into the query string.

mod duration;
mod query;

pub use duration::parse_sliding_duration;
pub use query::{build_query, CompiledQuery, QueryParam};

use thiserror::Error;

/// Compilation failures (spec.md §4.2, §7(f) "schema violation").
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("rules must contain at least one condition")]
    EmptyConditions,

    #[error("aggregation {0:?} requires an aggregation_field")]
    MissingAggregationField(crate::model::Aggregation),

    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("sliding time_window requires a duration")]
    MissingDuration,
}
