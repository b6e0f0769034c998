//! Raw inbound payloads
//!
//! A [`RawPayload`] is the decoded JSON object exactly as the upstream API
//! produced it. Both the mapper and the archive writer consume it; neither
//! mutates it.

use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while turning message text into a payload
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The text is not valid JSON
    #[error("Invalid JSON payload: {0}")]
    InvalidJson(String),

    /// The JSON value is valid but not an object
    #[error("Payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// A decoded JSON object received from the upstream source
#[derive(Debug, Clone, PartialEq)]
pub struct RawPayload(Value);

impl RawPayload {
    /// Wrap an already-decoded value. Fails unless the value is an object.
    pub fn new(value: Value) -> Result<Self, PayloadError> {
        match value {
            Value::Object(_) => Ok(Self(value)),
            other => Err(PayloadError::NotAnObject(json_kind(&other))),
        }
    }

    /// Parse message text with a real JSON parser.
    ///
    /// Near-JSON text (single quotes, `None`, `True`) is rejected rather than
    /// repaired.
    pub fn parse(text: &str) -> Result<Self, PayloadError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| PayloadError::InvalidJson(e.to_string()))?;
        Self::new(value)
    }

    /// Borrow the underlying JSON value
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Top-level keys of the payload
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.as_object().into_iter().flat_map(Map::keys)
    }

    /// Consume the payload and return the JSON value
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl FromStr for RawPayload {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<Value> for RawPayload {
    type Error = PayloadError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Short name of a JSON value's kind, used in error messages
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
