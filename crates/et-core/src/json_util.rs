//! Field accessors for inbound message payloads.
//!
//! Gateways are inconsistent about numeric encoding: the same field may
//! arrive as `100.05` or `"100.05"`. These helpers accept both.

use serde_json::{Map, Value};

/// Parse a JSON value (string or number) as `f64`.
#[inline]
pub fn parse_str_f64(v: Option<&Value>) -> Option<f64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        fast_float2::parse(s.trim()).ok()
    } else {
        v.as_f64()
    }
}

/// Parse a JSON value (string or number) as `i64`.
#[inline]
pub fn parse_str_i64(v: Option<&Value>) -> Option<i64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        s.trim().parse().ok()
    } else {
        v.as_i64()
    }
}

/// Named `f64` field on a field map.
#[inline]
pub fn f64_field(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    parse_str_f64(fields.get(key))
}

/// Named integer field on a field map.
#[inline]
pub fn i64_field(fields: &Map<String, Value>, key: &str) -> Option<i64> {
    parse_str_i64(fields.get(key))
}

/// Named string field on a field map. Numbers are rendered as text.
pub fn str_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
