//! Input payload parsing
//!
//! HTTP bodies are JSON: a single metric object, an array of them, or
//! `{"metrics": [...]}`. Log lines are either a JSON metric object or the
//! text form `<name> <value> [key=value ...]`.

use contracts::{MetricMessage, MetricValue, Tags};
use serde_json::Value;

use crate::error::{IngestionError, Result};

pub const HTTP_SOURCE: &str = "http";
pub const LOG_SOURCE: &str = "log_watcher";

/// Parse an HTTP request body into one or more messages, in body order
pub fn parse_http_body(body: &[u8]) -> Result<Vec<MetricMessage>> {
    let document: Value = serde_json::from_slice(body)
        .map_err(|e| IngestionError::parse_failed(HTTP_SOURCE, format!("invalid JSON: {e}")))?;

    let items = match document {
        Value::Array(items) => items,
        Value::Object(mut map) if map.contains_key("metrics") && !map.contains_key("name") => {
            match map.remove("metrics") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(IngestionError::parse_failed(
                        HTTP_SOURCE,
                        "\"metrics\" must be an array",
                    ))
                }
            }
        }
        single @ Value::Object(_) => vec![single],
        _ => {
            return Err(IngestionError::parse_failed(
                HTTP_SOURCE,
                "expected a metric object or an array of metric objects",
            ))
        }
    };

    if items.is_empty() {
        return Err(IngestionError::parse_failed(HTTP_SOURCE, "empty metric batch"));
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            metric_from_value(item).map_err(|message| {
                IngestionError::parse_failed(HTTP_SOURCE, format!("metric #{index}: {message}"))
            })
        })
        .collect()
}

/// Parse one log line
///
/// Blank lines yield `Ok(None)`.
pub fn parse_log_line(line: &str) -> Result<Option<MetricMessage>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if line.starts_with('{') {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| IngestionError::parse_failed(LOG_SOURCE, format!("invalid JSON: {e}")))?;
        return metric_from_value(value)
            .map(Some)
            .map_err(|message| IngestionError::parse_failed(LOG_SOURCE, message));
    }

    parse_text_line(line)
        .map(Some)
        .map_err(|message| IngestionError::parse_failed(LOG_SOURCE, message))
}

fn parse_text_line(line: &str) -> std::result::Result<MetricMessage, String> {
    let mut fields = line.split_whitespace();

    let name = fields.next().ok_or("missing metric name")?;
    let raw_value = fields
        .next()
        .ok_or_else(|| format!("missing value for metric '{name}'"))?;
    let value: f64 = raw_value
        .parse()
        .map_err(|_| format!("value '{raw_value}' is not a number"))?;
    if !value.is_finite() {
        return Err(format!("value '{raw_value}' is not finite"));
    }

    let mut tags = Tags::new();
    for field in fields {
        let (key, tag_value) = field
            .split_once('=')
            .filter(|(k, _)| !k.is_empty())
            .ok_or_else(|| format!("malformed tag '{field}', expected key=value"))?;
        tags.insert(key.to_string(), tag_value.to_string());
    }

    let mut message = MetricMessage::new(name, value);
    message.tags = tags;
    Ok(message)
}

fn metric_from_value(value: Value) -> std::result::Result<MetricMessage, String> {
    if !value.is_object() {
        return Err("metric must be a JSON object".to_string());
    }

    let message: MetricMessage = serde_json::from_value(value).map_err(|e| e.to_string())?;

    if message.name.trim().is_empty() {
        return Err("metric name must not be empty".to_string());
    }

    match &message.value {
        MetricValue::Number(v) if !v.is_finite() => Err("metric value must be finite".to_string()),
        MetricValue::Structured(v) if !(v.is_object() || v.is_array()) => {
            Err("metric value must be a number, object or array".to_string())
        }
        _ => Ok(message),
    }
}
