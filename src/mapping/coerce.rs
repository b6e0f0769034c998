//! Type coercion from loosely-typed JSON to column values
//!
//! The upstream API returns quantities either as native numbers or as
//! numeric strings, flags as booleans or `"true"`/`"false"`, and instants as
//! ISO-8601 strings or epoch seconds. Each accepted form of one quantity
//! coerces to the same [`MappedValue`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Number, Value};

use super::MappedValue;
use super::canonical::to_canonical_string;
use crate::schema::SemanticType;

// 2^63 as f64; integral floats must be strictly below it to fit an i64.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Coerce a present, non-null value to `target`.
///
/// On failure returns a short description of what was found, for
/// [`MappingError::TypeMismatch`](super::MappingError::TypeMismatch).
pub fn coerce(value: &Value, target: SemanticType) -> Result<MappedValue, String> {
    let coerced = match target {
        SemanticType::Integer => to_integer(value).map(MappedValue::Integer),
        SemanticType::Decimal => to_decimal(value).map(MappedValue::Decimal),
        SemanticType::Boolean => to_boolean(value).map(MappedValue::Boolean),
        SemanticType::String => to_text(value).map(MappedValue::Text),
        SemanticType::Timestamp => to_timestamp(value).map(MappedValue::Timestamp),
        SemanticType::Json => Some(MappedValue::Json(to_canonical_string(value))),
    };
    coerced.ok_or_else(|| describe(value))
}

fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => number_to_integer(n),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn number_to_integer(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    if n.is_u64() {
        // Above i64::MAX
        return None;
    }
    n.as_f64().and_then(integral)
}

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= -I64_BOUND && f < I64_BOUND {
        Some(f as i64)
    } else {
        None
    }
}

fn to_decimal(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn to_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                Some(true)
            } else if s.eq_ignore_ascii_case("false") {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn to_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}

/// Parse an upstream timestamp string into a UTC instant.
///
/// Accepts RFC 3339 (`2024-10-07T08:07:44.594Z`, `...+02:00`), naive
/// `YYYY-MM-DD[T ]HH:MM:SS[.fff]` read as UTC, and integer epoch seconds.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    text.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => {
            let shown: String = s.chars().take(32).collect();
            if shown.len() < s.len() {
                format!("string \"{}...\"", shown)
            } else {
                format!("string \"{}\"", shown)
            }
        }
        Value::Number(n) => format!("number {}", n),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
        Value::Null => "null".to_string(),
    }
}
