use thiserror::Error;

use crate::compiler::CompileError;

/// Errors surfaced by the membership evaluation and materialization pipeline.
///
/// Variants map onto the HTTP-status-shaped taxonomy of the domain layer
/// (spec.md §7) even though no transport is implemented in this crate.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bus error: {0}")]
    Bus(String),

    #[error("rule compilation error: {0}")]
    Compile(#[from] CompileError),

    #[error("recompute already in progress for cohort {0}")]
    RecomputeInProgress(crate::model::CohortId),

    #[error("cohort not found: {0}")]
    CohortNotFound(crate::model::CohortId),

    #[error("recompute job not found: {0}")]
    RecomputeJobNotFound(crate::recompute::JobId),

    #[error("schema violation: {0}")]
    Schema(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Hint for a future HTTP transport to translate this error into a
    /// status code without re-deriving the mapping of spec.md §7.
    pub fn status_hint(&self) -> u16 {
        match self {
            EngineError::RecomputeInProgress(_) => 409,
            EngineError::CohortNotFound(_) | EngineError::RecomputeJobNotFound(_) => 404,
            EngineError::Schema(_) => 400,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
