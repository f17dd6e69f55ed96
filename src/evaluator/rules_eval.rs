use chrono::{DateTime, Utc};

use crate::compiler::CompileError;
use crate::model::{
    bucket_of, Aggregation, Condition, ConditionKind, Operator, PerUserState, Rules, RulesOperator,
    TimeWindow,
};

/// Evaluates `rules` against `state` at event-time `event_ts` (spec.md
/// §4.1 step 3). `AND` short-circuits on the first `false`, `OR`
/// short-circuits on the first `true`.
pub fn evaluate_rules(rules: &Rules, state: &PerUserState, event_ts: DateTime<Utc>) -> bool {
    match rules.operator {
        RulesOperator::And => rules
            .conditions
            .iter()
            .all(|c| evaluate_condition(c, state, event_ts)),
        RulesOperator::Or => rules
            .conditions
            .iter()
            .any(|c| evaluate_condition(c, state, event_ts)),
    }
}

fn evaluate_condition(condition: &Condition, state: &PerUserState, event_ts: DateTime<Utc>) -> bool {
    match condition.kind {
        ConditionKind::Event => evaluate_event_condition(condition, state, event_ts),
        ConditionKind::Aggregate => evaluate_aggregate_condition(condition, state, event_ts),
        // Property conditions require per-user property state the event
        // stream does not carry; they are only evaluated by recompute
        // (spec.md §4.1 step 3, §9 "Property conditions in streaming").
        ConditionKind::Property => false,
    }
}

fn evaluate_event_condition(
    condition: &Condition,
    state: &PerUserState,
    event_ts: DateTime<Utc>,
) -> bool {
    let Some(last) = state.last_event_ts(&condition.event_name) else {
        return false;
    };

    match &condition.time_window {
        None => true,
        Some(TimeWindow::Sliding { duration }) => {
            match crate::compiler::parse_sliding_duration(duration) {
                Ok(d) => last >= event_ts - d,
                Err(_) => false,
            }
        }
        Some(TimeWindow::Absolute { start, end }) => last >= *start && last <= *end,
    }
}

fn evaluate_aggregate_condition(
    condition: &Condition,
    state: &PerUserState,
    event_ts: DateTime<Utc>,
) -> bool {
    let (start_bucket, end_bucket) = match window_buckets(condition, event_ts) {
        Ok(range) => range,
        Err(_) => return false,
    };

    let Some(aggregation) = condition.aggregation else {
        return false;
    };

    let Some(op) = Operator::parse(&condition.operator) else {
        return false;
    };

    let value = match aggregation {
        Aggregation::Count => {
            state.count_in_range(&condition.event_name, start_bucket, end_bucket) as f64
        }
        Aggregation::Sum | Aggregation::Avg | Aggregation::Min | Aggregation::Max => {
            let Some(field) = condition.aggregation_field.as_deref() else {
                return false;
            };
            // Min/Max/Avg are not separately tracked in streaming state
            // (only running counts and sums, spec.md §3); Sum is exact,
            // the rest fall back to Sum as the closest streaming-available
            // approximation and are fully corrected by the next recompute.
            state.sum_in_range(&condition.event_name, field, start_bucket, end_bucket)
        }
        Aggregation::DistinctCount => return false,
    };

    let Some(threshold) = condition.value.as_f64() else {
        return false;
    };

    compare(value, op, threshold)
}

fn compare(lhs: f64, op: Operator, rhs: f64) -> bool {
    match op {
        Operator::Eq => lhs == rhs,
        Operator::Ne => lhs != rhs,
        Operator::Gt => lhs > rhs,
        Operator::Gte => lhs >= rhs,
        Operator::Lt => lhs < rhs,
        Operator::Lte => lhs <= rhs,
        // IN/NIN are not meaningful against a single numeric aggregate.
        Operator::In | Operator::Nin => false,
    }
}

fn window_buckets(
    condition: &Condition,
    event_ts: DateTime<Utc>,
) -> Result<(crate::model::Bucket, crate::model::Bucket), CompileError> {
    match &condition.time_window {
        None => Ok((i64::MIN, bucket_of(event_ts))),
        Some(TimeWindow::Sliding { duration }) => {
            let d = crate::compiler::parse_sliding_duration(duration)?;
            Ok((bucket_of(event_ts - d), bucket_of(event_ts)))
        }
        Some(TimeWindow::Absolute { start, end }) => Ok((bucket_of(*start), bucket_of(*end))),
    }
}
