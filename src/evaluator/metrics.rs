use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Evaluator counters, grounded in the teacher's atomic-counter metrics
/// structs (`websocket::connection::ConnectionStats`,
/// `event_processing::StreamMetrics`).
#[derive(Debug, Default)]
pub struct EvaluatorMetrics {
    events_processed: AtomicU64,
    transitions_emitted: AtomicU64,
    conditions_evaluated: AtomicU64,
    state_evictions: AtomicU64,
    poison_events_skipped: AtomicU64,
}

impl EvaluatorMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_event(&self) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transition(&self) {
        self.transitions_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_condition_evaluated(&self) {
        self.conditions_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.state_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poison_skip(&self) {
        self.poison_events_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EvaluatorMetricsSnapshot {
        EvaluatorMetricsSnapshot {
            events_processed: self.events_processed.load(Ordering::Relaxed),
            transitions_emitted: self.transitions_emitted.load(Ordering::Relaxed),
            conditions_evaluated: self.conditions_evaluated.load(Ordering::Relaxed),
            state_evictions: self.state_evictions.load(Ordering::Relaxed),
            poison_events_skipped: self.poison_events_skipped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvaluatorMetricsSnapshot {
    pub events_processed: u64,
    pub transitions_emitted: u64,
    pub conditions_evaluated: u64,
    pub state_evictions: u64,
    pub poison_events_skipped: u64,
}
