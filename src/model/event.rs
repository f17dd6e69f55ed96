use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::UserId;

/// Unique event identifier, grounded in the teacher's `EventId(u128)`
/// newtype (`event_processing::EventId`), adapted to UUIDv7 so ids are
/// sortable by creation time without an extra counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub uuid::Uuid);

impl EventId {
    pub fn new() -> Self {
        EventId(uuid::Uuid::now_v7())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Typed scalar carried in an event's `properties` map (spec.md §3:
/// "arbitrary JSON scalars and nested values"). Grounded in the teacher's
/// `event_processing::EventValue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<EventValue>),
    Object(HashMap<String, EventValue>),
}

impl EventValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EventValue::Int(v) => Some(*v as f64),
            EventValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EventValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, EventValue::Int(_) | EventValue::Float(_))
    }
}

impl From<serde_json::Value> for EventValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => EventValue::Null,
            serde_json::Value::Bool(b) => EventValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    EventValue::Int(i)
                } else {
                    EventValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => EventValue::String(s),
            serde_json::Value::Array(a) => {
                EventValue::Array(a.into_iter().map(EventValue::from).collect())
            }
            serde_json::Value::Object(o) => EventValue::Object(
                o.into_iter().map(|(k, v)| (k, EventValue::from(v))).collect(),
            ),
        }
    }
}

/// Immutable event record (spec.md §3). `received_at >= timestamp` is
/// expected but not enforced (watermarks tolerate up to 10s
/// out-of-orderness, spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub user_id: UserId,
    pub event_name: String,
    #[serde(default)]
    pub properties: HashMap<String, EventValue>,
    pub timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

impl Event {
    pub fn numeric_property(&self, name: &str) -> Option<f64> {
        self.properties.get(name).and_then(EventValue::as_f64)
    }
}

/// Raw-event storage row (spec.md §4.4 event writer): `properties` is
/// serialized to a JSON string, `nil -> "{}"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEventRow {
    pub id: EventId,
    pub user_id: UserId,
    pub event_name: String,
    pub properties_json: String,
    pub timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

impl From<&Event> for RawEventRow {
    fn from(event: &Event) -> Self {
        let properties_json = if event.properties.is_empty() {
            "{}".to_string()
        } else {
            serde_json::to_string(&event.properties).unwrap_or_else(|_| "{}".to_string())
        };
        RawEventRow {
            id: event.id,
            user_id: event.user_id.clone(),
            event_name: event.event_name.clone(),
            properties_json,
            timestamp: event.timestamp,
            received_at: event.received_at,
        }
    }
}
