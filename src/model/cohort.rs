use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CohortId;

/// Lifecycle status of a cohort definition (spec.md §3).
///
/// `draft` freezes nothing, `active` is evaluated on every event, `inactive`
/// freezes evaluation without deleting materialized state. Deletion is not
/// a status: it is a tombstone on the `cohort.definitions` topic (spec.md
/// §4.1, "A null-value message is a tombstone").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CohortStatus {
    Draft,
    Active,
    Inactive,
}

/// Boolean combinator over an ordered sequence of conditions (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RulesOperator {
    And,
    Or,
}

/// A cohort's rule set: a top-level boolean operator over an ordered list
/// of conditions (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rules {
    pub operator: RulesOperator,
    pub conditions: Vec<Condition>,
}

/// Discriminator for a condition's evaluation strategy (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    Event,
    Property,
    Aggregate,
}

/// Aggregation function applied over a time window (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    DistinctCount,
}

/// Comparison operator (spec.md §3, §4.2 operator mapping).
///
/// On the wire, `Condition::operator` and `PropertyFilter::operator` are
/// plain strings rather than this enum: spec.md §4.2 requires an unknown
/// top-level operator to be a compile error but an unknown property-filter
/// operator to be silently skipped, which only makes sense if unrecognized
/// values can reach the compiler at all. `Operator::parse` is the mapping
/// used internally by the compiler (spec.md §4.2 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
}

impl Operator {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "eq" => Some(Operator::Eq),
            "ne" => Some(Operator::Ne),
            "gt" => Some(Operator::Gt),
            "gte" => Some(Operator::Gte),
            "lt" => Some(Operator::Lt),
            "lte" => Some(Operator::Lte),
            "in" => Some(Operator::In),
            "nin" => Some(Operator::Nin),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::In => "IN",
            Operator::Nin => "NOT IN",
        }
    }
}

/// A time window qualifying an event or aggregate condition (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeWindow {
    /// `duration` uses the grammar `^(\d+)([smhdwM])$` (spec.md §4.2).
    Sliding { duration: String },
    Absolute {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// A `(key, operator, value)` filter applied to event properties (spec.md
/// §3). Order matters: filters are applied in sequence during compilation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub key: String,
    pub operator: String,
    pub value: serde_json::Value,
}

/// A single leaf condition in a `Rules` tree (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    pub event_name: String,
    pub property_name: Option<String>,
    pub aggregation: Option<Aggregation>,
    pub aggregation_field: Option<String>,
    pub time_window: Option<TimeWindow>,
    pub operator: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub property_filters: Vec<PropertyFilter>,
}

/// A versioned, named cohort definition (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortDefinition {
    pub id: CohortId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: CohortStatus,
    pub version: u64,
    pub rules: Rules,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CohortDefinition {
    /// True if this cohort's rule set mentions `event_name` anywhere,
    /// directly or inside a property filter's own event scoping. Used by
    /// the evaluator's relevance test (spec.md §4.1 step 3).
    pub fn references_event(&self, event_name: &str) -> bool {
        self.rules
            .conditions
            .iter()
            .any(|c| c.event_name == event_name)
    }
}
