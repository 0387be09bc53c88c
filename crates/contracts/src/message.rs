//! MetricMessage - the unit of work flowing through the relay
//!
//! Created by input adapters, resident only inside the queue, handed to sinks
//! by shared reference.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key-value tags attached to a metric (ordered for stable output)
pub type Tags = BTreeMap<String, String>;

/// Metric value: a plain number or a structured JSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Numeric sample
    Number(f64),
    /// Structured payload (JSON object or array)
    Structured(serde_json::Value),
}

impl MetricValue {
    /// Numeric view, if the value is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Structured(_) => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<serde_json::Value> for MetricValue {
    fn from(value: serde_json::Value) -> Self {
        match value.as_f64() {
            Some(v) if value.is_number() => Self::Number(v),
            _ => Self::Structured(value),
        }
    }
}

/// A single metric record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricMessage {
    /// Metric name / identifier
    pub name: String,

    /// Metric value
    pub value: MetricValue,

    /// Optional tags
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,

    /// Event time (assigned at enqueue when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl MetricMessage {
    /// Create an untagged, unstamped message
    pub fn new(name: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            tags: Tags::new(),
            timestamp: None,
        }
    }

    /// Add a tag
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Set an explicit timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Fill in `now` if no timestamp is present; an existing one is kept
    pub fn stamped(mut self, now: DateTime<Utc>) -> Self {
        if self.timestamp.is_none() {
            self.timestamp = Some(now);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_stamped_keeps_existing_timestamp() {
        let original = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let msg = MetricMessage::new("cpu", 1.0)
            .with_timestamp(original)
            .stamped(later);
        assert_eq!(msg.timestamp, Some(original));

        let msg = MetricMessage::new("cpu", 1.0).stamped(later);
        assert_eq!(msg.timestamp, Some(later));
    }

    #[test]
    fn test_integer_value_deserializes_as_number() {
        let msg: MetricMessage = serde_json::from_str(r#"{"name":"hits","value":3}"#).unwrap();
        assert_eq!(msg.value, MetricValue::Number(3.0));
        assert!(msg.tags.is_empty());
        assert!(msg.timestamp.is_none());
    }

    #[test]
    fn test_structured_value() {
        let msg: MetricMessage =
            serde_json::from_str(r#"{"name":"latency","value":{"p50":1.5,"p99":9.0}}"#).unwrap();
        assert!(matches!(msg.value, MetricValue::Structured(_)));
        assert_eq!(msg.value.as_f64(), None);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<MetricMessage, _> =
            serde_json::from_str(r#"{"name":"a","value":1,"unit":"ms"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialized_fields_survive_json() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let msg = MetricMessage::new("orders", 42.5)
            .with_tag("region", "eu")
            .with_timestamp(ts);

        let json = serde_json::to_string(&msg).unwrap();
        let back: MetricMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
