use chrono::{DateTime, Utc};

use crate::model::{
    Aggregation, Condition, ConditionKind, Operator, PropertyFilter, Rules, RulesOperator,
    TimeWindow,
};

use super::duration::parse_sliding_duration;
use super::CompileError;

/// A positional query parameter. `List` backs `IN`/`NOT IN` — the
/// analytical store's executor expands it when binding.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Str(String),
    I64(i64),
    F64(f64),
    Timestamp(DateTime<Utc>),
    List(Vec<QueryParam>),
}

impl From<&serde_json::Value> for QueryParam {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => QueryParam::Str(s.clone()),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    QueryParam::I64(i)
                } else {
                    QueryParam::F64(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::Bool(b) => QueryParam::Str(b.to_string()),
            serde_json::Value::Array(items) => {
                QueryParam::List(items.iter().map(QueryParam::from).collect())
            }
            serde_json::Value::Null => QueryParam::Str(String::new()),
            serde_json::Value::Object(_) => QueryParam::Str(value.to_string()),
        }
    }
}

/// The compiled output of `build_query`: a parameterized SQL-shaped query
/// string with positional parameters (spec.md §4.2, public contract
/// `BuildQuery(rules) -> (sql, args, err)`).
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub args: Vec<QueryParam>,
}

/// Translates `rules` into a parameterized analytical query whose result is
/// the set of `user_id`s currently matching it (spec.md §4.2).
///
/// Pure function of `(rules, now)`: never reads the system clock, so two
/// calls with identical inputs produce byte-identical output (spec.md §8,
/// "Compiler determinism").
pub fn build_query(rules: &Rules, now: DateTime<Utc>) -> Result<CompiledQuery, CompileError> {
    if rules.conditions.is_empty() {
        return Err(CompileError::EmptyConditions);
    }

    let mut args = Vec::new();
    let mut subqueries = Vec::with_capacity(rules.conditions.len());
    for condition in &rules.conditions {
        subqueries.push(compile_condition(condition, now, &mut args)?);
    }

    let joiner = match rules.operator {
        RulesOperator::And => " INTERSECT ",
        RulesOperator::Or => " UNION ",
    };

    Ok(CompiledQuery {
        sql: subqueries.join(joiner),
        args,
    })
}

fn compile_condition(
    condition: &Condition,
    now: DateTime<Utc>,
    args: &mut Vec<QueryParam>,
) -> Result<String, CompileError> {
    match condition.kind {
        ConditionKind::Event => compile_event(condition, now, args),
        ConditionKind::Aggregate => compile_aggregate(condition, now, args),
        ConditionKind::Property => compile_property(condition, now, args),
    }
}

fn resolve_time_window(
    window: Option<&TimeWindow>,
    now: DateTime<Utc>,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, CompileError> {
    match window {
        None => Ok(None),
        Some(TimeWindow::Sliding { duration }) => {
            if duration.is_empty() {
                return Err(CompileError::MissingDuration);
            }
            let d = parse_sliding_duration(duration)?;
            Ok(Some((now - d, now)))
        }
        Some(TimeWindow::Absolute { start, end }) => Ok(Some((*start, *end))),
    }
}

fn append_time_filter(
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    sql: &mut String,
    args: &mut Vec<QueryParam>,
) {
    if let Some((start, end)) = window {
        sql.push_str(" AND ts >= ? AND ts <= ?");
        args.push(QueryParam::Timestamp(start));
        args.push(QueryParam::Timestamp(end));
    }
}

fn append_property_filters(
    filters: &[PropertyFilter],
    sql: &mut String,
    args: &mut Vec<QueryParam>,
) {
    for filter in filters {
        // Unlike a condition's own operator, an unrecognized property
        // filter operator is silently skipped (spec.md §4.2), not an error.
        let Some(op) = Operator::parse(&filter.operator) else {
            continue;
        };
        let extractor = extractor_for_value(&filter.value);
        sql.push_str(&format!(
            " AND {extractor}(properties, '{}') {} ?",
            filter.key,
            op.as_sql()
        ));
        args.push(QueryParam::from(&filter.value));
    }
}

/// Value-type-directed extraction (spec.md §4.2): numeric (float) values
/// use a numeric extractor, integer literals use an integer extractor,
/// everything else uses a string extractor.
fn extractor_for_value(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => "integer_extract",
        serde_json::Value::Number(_) => "numeric_extract",
        _ => "string_extract",
    }
}

fn compile_event(
    condition: &Condition,
    now: DateTime<Utc>,
    args: &mut Vec<QueryParam>,
) -> Result<String, CompileError> {
    let mut sql = String::from("SELECT DISTINCT user_id FROM events WHERE event_name = ?");
    args.push(QueryParam::Str(condition.event_name.clone()));

    let window = resolve_time_window(condition.time_window.as_ref(), now)?;
    append_time_filter(window, &mut sql, args);
    append_property_filters(&condition.property_filters, &mut sql, args);

    Ok(sql)
}

fn compile_aggregate(
    condition: &Condition,
    now: DateTime<Utc>,
    args: &mut Vec<QueryParam>,
) -> Result<String, CompileError> {
    let mut sql = String::from("SELECT user_id FROM events WHERE event_name = ?");
    args.push(QueryParam::Str(condition.event_name.clone()));

    let window = resolve_time_window(condition.time_window.as_ref(), now)?;
    append_time_filter(window, &mut sql, args);
    append_property_filters(&condition.property_filters, &mut sql, args);

    let aggregation = condition
        .aggregation
        .ok_or(CompileError::MissingAggregationField(Aggregation::Count))?;

    let agg_expr = match aggregation {
        Aggregation::Count => "COUNT(*)".to_string(),
        Aggregation::Sum | Aggregation::Avg | Aggregation::Min | Aggregation::Max => {
            let field = condition
                .aggregation_field
                .clone()
                .ok_or(CompileError::MissingAggregationField(aggregation))?;
            let func = match aggregation {
                Aggregation::Sum => "SUM",
                Aggregation::Avg => "AVG",
                Aggregation::Min => "MIN",
                Aggregation::Max => "MAX",
                _ => unreachable!(),
            };
            format!("{func}(numeric_extract(properties, '{field}'))")
        }
        Aggregation::DistinctCount => {
            let field = condition
                .aggregation_field
                .clone()
                .ok_or(CompileError::MissingAggregationField(aggregation))?;
            format!("COUNT(DISTINCT string_extract(properties, '{field}'))")
        }
    };

    let op = Operator::parse(&condition.operator)
        .ok_or_else(|| CompileError::UnknownOperator(condition.operator.clone()))?;

    sql.push_str(&format!(" GROUP BY user_id HAVING {agg_expr} {} ?", op.as_sql()));
    args.push(QueryParam::from(&condition.value));

    Ok(sql)
}

fn compile_property(
    condition: &Condition,
    now: DateTime<Utc>,
    args: &mut Vec<QueryParam>,
) -> Result<String, CompileError> {
    let property = condition
        .property_name
        .clone()
        .ok_or_else(|| CompileError::UnknownOperator("missing property_name".to_string()))?;

    let op = Operator::parse(&condition.operator)
        .ok_or_else(|| CompileError::UnknownOperator(condition.operator.clone()))?;

    let extractor = extractor_for_value(&condition.value);
    let mut sql = format!(
        "SELECT DISTINCT user_id FROM events WHERE {extractor}(properties, '{property}') {} ?",
        op.as_sql()
    );
    args.push(QueryParam::from(&condition.value));

    if !condition.event_name.is_empty() {
        sql.push_str(" AND event_name = ?");
        args.push(QueryParam::Str(condition.event_name.clone()));
    }

    let window = resolve_time_window(condition.time_window.as_ref(), now)?;
    append_time_filter(window, &mut sql, args);

    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConditionKind, RulesOperator, TimeWindow};
    use chrono::TimeZone;

    fn base_condition() -> Condition {
        Condition {
            kind: ConditionKind::Event,
            event_name: "purchase".to_string(),
            property_name: None,
            aggregation: None,
            aggregation_field: None,
            time_window: None,
            operator: "eq".to_string(),
            value: serde_json::json!(true),
            property_filters: Vec::new(),
        }
    }

    #[test]
    fn empty_conditions_is_error() {
        let rules = Rules {
            operator: RulesOperator::And,
            conditions: vec![],
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(build_query(&rules, now).unwrap_err(), CompileError::EmptyConditions);
    }

    #[test]
    fn single_event_condition_compiles() {
        let rules = Rules {
            operator: RulesOperator::And,
            conditions: vec![base_condition()],
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let q = build_query(&rules, now).unwrap();
        assert!(q.sql.contains("SELECT DISTINCT user_id FROM events WHERE event_name = ?"));
        assert_eq!(q.args, vec![QueryParam::Str("purchase".to_string())]);
    }

    #[test]
    fn and_joins_with_intersect() {
        let mut second = base_condition();
        second.event_name = "signup".to_string();
        let rules = Rules {
            operator: RulesOperator::And,
            conditions: vec![base_condition(), second],
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let q = build_query(&rules, now).unwrap();
        assert!(q.sql.contains(" INTERSECT "));
    }

    #[test]
    fn or_joins_with_union() {
        let mut second = base_condition();
        second.event_name = "signup".to_string();
        let rules = Rules {
            operator: RulesOperator::Or,
            conditions: vec![base_condition(), second],
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let q = build_query(&rules, now).unwrap();
        assert!(q.sql.contains(" UNION "));
    }

    #[test]
    fn aggregate_requires_aggregation_field() {
        let mut c = base_condition();
        c.kind = ConditionKind::Aggregate;
        c.aggregation = Some(Aggregation::Sum);
        c.operator = "gte".to_string();
        c.value = serde_json::json!(1000);
        let rules = Rules {
            operator: RulesOperator::And,
            conditions: vec![c],
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            build_query(&rules, now).unwrap_err(),
            CompileError::MissingAggregationField(Aggregation::Sum)
        ));
    }

    #[test]
    fn aggregate_sum_with_sliding_window_compiles() {
        let mut c = base_condition();
        c.kind = ConditionKind::Aggregate;
        c.aggregation = Some(Aggregation::Sum);
        c.aggregation_field = Some("amount".to_string());
        c.operator = "gte".to_string();
        c.value = serde_json::json!(1000);
        c.time_window = Some(TimeWindow::Sliding {
            duration: "7d".to_string(),
        });
        let rules = Rules {
            operator: RulesOperator::And,
            conditions: vec![c],
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let q = build_query(&rules, now).unwrap();
        assert!(q.sql.contains("SUM(numeric_extract(properties, 'amount'))"));
        assert!(q.sql.contains("HAVING"));
        assert!(q.sql.contains("GROUP BY user_id"));
    }

    #[test]
    fn unknown_condition_operator_is_error() {
        let mut c = base_condition();
        c.operator = "glob".to_string();
        let rules = Rules {
            operator: RulesOperator::And,
            conditions: vec![c],
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        // An event-type condition doesn't validate its own operator (it has
        // none to apply beyond existence), so exercise this through a
        // property condition instead.
        let mut p = base_condition();
        p.kind = ConditionKind::Property;
        p.property_name = Some("plan".to_string());
        p.operator = "glob".to_string();
        let rules2 = Rules {
            operator: RulesOperator::And,
            conditions: vec![p],
        };
        assert!(build_query(&rules, now).is_ok());
        assert!(matches!(
            build_query(&rules2, now).unwrap_err(),
            CompileError::UnknownOperator(_)
        ));
    }

    #[test]
    fn unknown_property_filter_operator_is_silently_skipped() {
        let mut c = base_condition();
        c.property_filters = vec![PropertyFilter {
            key: "plan".to_string(),
            operator: "glob".to_string(),
            value: serde_json::json!("pro"),
        }];
        let rules = Rules {
            operator: RulesOperator::And,
            conditions: vec![c],
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let q = build_query(&rules, now).unwrap();
        assert!(!q.sql.contains("plan"));
    }

    #[test]
    fn determinism_same_inputs_produce_identical_output() {
        let rules = Rules {
            operator: RulesOperator::And,
            conditions: vec![base_condition()],
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let a = build_query(&rules, now).unwrap();
        let b = build_query(&rules, now).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn property_condition_uses_value_type_directed_extractor() {
        let mut c = base_condition();
        c.kind = ConditionKind::Property;
        c.property_name = Some("score".to_string());
        c.value = serde_json::json!(3.5);
        c.event_name = String::new();
        let rules = Rules {
            operator: RulesOperator::And,
            conditions: vec![c],
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let q = build_query(&rules, now).unwrap();
        assert!(q.sql.contains("numeric_extract(properties, 'score')"));
        assert!(!q.sql.contains("AND event_name"));
    }
}
