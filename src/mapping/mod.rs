//! Field mapper
//!
//! Deterministic, side-effect-free transform from a [`RawPayload`] to typed,
//! schema-conformant [`MappedRecord`]s:
//!
//! 1. each [`FieldSpec`] source path is resolved (aliases in order, JSON
//!    `null` counts as absent),
//! 2. a present value is coerced to the declared [`SemanticType`],
//! 3. an absent value takes the default, NULL when nullable, or fails with
//!    [`MappingError::MissingRequiredField`],
//! 4. a value that cannot be coerced fails with
//!    [`MappingError::TypeMismatch`]; it is never replaced by NULL.
//!
//! Mapping is all-or-nothing: either every column of a record is populated,
//! or an error is returned and nothing is written.

pub mod canonical;
pub mod coerce;
pub mod path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::payload::{RawPayload, json_kind};
use crate::schema::{FieldSource, FieldSpec, Scope, SemanticType, TableSchema};

/// Error type for mapping a payload onto a schema
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingError {
    /// A non-nullable column without default had no source value
    #[error("Missing required field '{0}'")]
    MissingRequiredField(String),

    /// A source value was present but could not be coerced
    #[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: String,
    },
}

impl MappingError {
    /// Column (or source path) the error refers to
    pub fn field(&self) -> &str {
        match self {
            MappingError::MissingRequiredField(field) => field,
            MappingError::TypeMismatch { field, .. } => field,
        }
    }
}

/// Typed column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum MappedValue {
    Null,
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Text(String),
    Timestamp(DateTime<Utc>),
    /// Canonical JSON text
    Json(String),
}

impl MappedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, MappedValue::Null)
    }

    /// Semantic type carried by this value (`None` for NULL)
    pub fn semantic_type(&self) -> Option<SemanticType> {
        match self {
            MappedValue::Null => None,
            MappedValue::Integer(_) => Some(SemanticType::Integer),
            MappedValue::Decimal(_) => Some(SemanticType::Decimal),
            MappedValue::Boolean(_) => Some(SemanticType::Boolean),
            MappedValue::Text(_) => Some(SemanticType::String),
            MappedValue::Timestamp(_) => Some(SemanticType::Timestamp),
            MappedValue::Json(_) => Some(SemanticType::Json),
        }
    }

    /// Whether this value may be stored in a column of the given type
    pub fn conforms_to(&self, semantic_type: SemanticType, nullable: bool) -> bool {
        match self.semantic_type() {
            None => nullable,
            Some(t) => t == semantic_type,
        }
    }

    /// JSON rendering, used for display and content hashing
    pub fn to_json(&self) -> Value {
        match self {
            MappedValue::Null => Value::Null,
            MappedValue::Integer(i) => Value::from(*i),
            MappedValue::Decimal(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            MappedValue::Boolean(b) => Value::Bool(*b),
            MappedValue::Text(s) => Value::String(s.clone()),
            MappedValue::Timestamp(ts) => {
                Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            MappedValue::Json(text) => {
                serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
            }
        }
    }
}

/// One schema-conformant row: a value for every column, in declaration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedRecord {
    schema_id: String,
    columns: Vec<(String, MappedValue)>,
}

impl MappedRecord {
    /// Id of the schema this record was mapped against
    pub fn schema_id(&self) -> &str {
        &self.schema_id
    }

    /// Value of a column
    pub fn get(&self, column: &str) -> Option<&MappedValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// `(column, value)` pairs in declaration order
    pub fn columns(&self) -> &[(String, MappedValue)] {
        &self.columns
    }

    /// Values in declaration order
    pub fn values(&self) -> impl Iterator<Item = &MappedValue> {
        self.columns.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Render as a JSON object keyed by column name
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .columns
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        Value::Object(map)
    }
}

/// Map a payload as a single record.
///
/// The payload is both the record and the envelope; `records_at` is ignored.
pub fn map(raw: &RawPayload, schema: &TableSchema) -> Result<MappedRecord, MappingError> {
    map_record(raw.value(), raw.value(), schema)
}

/// Map every record a payload carries.
///
/// When the schema declares `records_at` and the payload has that path, each
/// element of the array is one record; otherwise the payload itself is the
/// single record. Every record must map before any is returned.
pub fn map_records(
    raw: &RawPayload,
    schema: &TableSchema,
) -> Result<Vec<MappedRecord>, MappingError> {
    let envelope = raw.value();

    let Some(records_path) = schema.records_at() else {
        return map(raw, schema).map(|record| vec![record]);
    };

    let items = match path::resolve_present(envelope, records_path) {
        None => {
            debug!(
                schema = schema.id(),
                path = records_path,
                "Record array absent, mapping payload as a single record"
            );
            return map(raw, schema).map(|record| vec![record]);
        }
        Some(Value::Array(items)) if items.is_empty() => {
            warn!(schema = schema.id(), path = records_path, "Payload carries no records");
            return Ok(Vec::new());
        }
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(MappingError::TypeMismatch {
                field: records_path.to_string(),
                expected: "array",
                actual: json_kind(other).to_string(),
            });
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            if !item.is_object() {
                return Err(MappingError::TypeMismatch {
                    field: format!("{records_path}.{index}"),
                    expected: "object",
                    actual: json_kind(item).to_string(),
                });
            }
            map_record(envelope, item, schema).inspect_err(|e| {
                warn!(schema = schema.id(), record = index, error = %e, "Record failed to map");
            })
        })
        .collect()
}

fn map_record(
    envelope: &Value,
    record: &Value,
    schema: &TableSchema,
) -> Result<MappedRecord, MappingError> {
    let mut columns = Vec::with_capacity(schema.fields().len());
    let mut derived = Vec::new();

    for (position, field) in schema.fields().iter().enumerate() {
        match &field.source {
            FieldSource::ContentHash => {
                derived.push(position);
                columns.push((field.name.clone(), MappedValue::Null));
            }
            FieldSource::Path { scope, .. } => {
                let base = match scope {
                    Scope::Record => record,
                    Scope::Envelope => envelope,
                };
                let value = map_field(base, field)?;
                columns.push((field.name.clone(), value));
            }
        }
    }

    if !derived.is_empty() {
        let hash = content_hash(&columns, &derived);
        for position in derived {
            columns[position].1 = MappedValue::Text(hash.clone());
        }
    }

    Ok(MappedRecord {
        schema_id: schema.id().to_string(),
        columns,
    })
}

fn map_field(base: &Value, field: &FieldSpec) -> Result<MappedValue, MappingError> {
    let present = field
        .source
        .candidates()
        .find_map(|candidate| path::resolve_present(base, candidate));

    match present {
        Some(value) => coerce::coerce(value, field.semantic_type).map_err(|actual| {
            let err = MappingError::TypeMismatch {
                field: field.name.clone(),
                expected: field.semantic_type.name(),
                actual,
            };
            warn!(field = %field.name, error = %err, "Upstream value does not match column type");
            err
        }),
        None => match &field.default {
            Some(default) => Ok(default.clone()),
            None if field.nullable => Ok(MappedValue::Null),
            None => Err(MappingError::MissingRequiredField(field.name.clone())),
        },
    }
}

// Hash over the mapped (not raw) columns, so renamed upstream keys and
// string-vs-number encodings of the same content hash identically.
fn content_hash(columns: &[(String, MappedValue)], derived: &[usize]) -> String {
    let map: Map<String, Value> = columns
        .iter()
        .enumerate()
        .filter(|(position, _)| !derived.contains(position))
        .map(|(_, (name, value))| (name.clone(), value.to_json()))
        .collect();
    canonical::content_hash(&Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;
    use serde_json::json;

    fn price_schema() -> TableSchema {
        TableSchema::builder("prices.v1", "prices")
            .field(FieldSpec::integer("id"))
            .field(FieldSpec::string("name"))
            .field(FieldSpec::string("symbol"))
            .field(FieldSpec::decimal("price").path("quote.USD.price"))
            .primary_key(["id"])
            .build()
            .unwrap()
    }

    fn payload(value: Value) -> RawPayload {
        RawPayload::new(value).unwrap()
    }

    #[test]
    fn test_map_example_payload() {
        let raw = payload(json!({
            "id": 1, "name": "Bitcoin", "symbol": "BTC",
            "quote": {"USD": {"price": 63611.48}}
        }));
        let record = map(&raw, &price_schema()).unwrap();
        assert_eq!(record.schema_id(), "prices.v1");
        assert_eq!(record.get("id"), Some(&MappedValue::Integer(1)));
        assert_eq!(record.get("name"), Some(&MappedValue::Text("Bitcoin".into())));
        assert_eq!(record.get("symbol"), Some(&MappedValue::Text("BTC".into())));
        assert_eq!(record.get("price"), Some(&MappedValue::Decimal(63611.48)));
        assert_eq!(record.len(), 4);
    }

    #[test]
    fn test_missing_required_field_named() {
        let raw = payload(json!({"id": 1, "name": "Bitcoin", "quote": {"USD": {"price": 1.0}}}));
        let err = map(&raw, &price_schema()).unwrap_err();
        assert_eq!(err, MappingError::MissingRequiredField("symbol".to_string()));
    }

    #[test]
    fn test_null_counts_as_missing() {
        let raw = payload(json!({
            "id": 1, "name": "Bitcoin", "symbol": null,
            "quote": {"USD": {"price": 1.0}}
        }));
        let err = map(&raw, &price_schema()).unwrap_err();
        assert_eq!(err.field(), "symbol");
    }

    #[test]
    fn test_type_mismatch_is_not_nulled() {
        let schema = TableSchema::builder("t.v1", "t")
            .field(FieldSpec::decimal("price").nullable())
            .build()
            .unwrap();
        let raw = payload(json!({"price": "about ten"}));
        let err = map(&raw, &schema).unwrap_err();
        assert_eq!(
            err,
            MappingError::TypeMismatch {
                field: "price".to_string(),
                expected: "decimal",
                actual: "string \"about ten\"".to_string(),
            }
        );
    }

    #[test]
    fn test_default_and_nullable_substitution() {
        let schema = TableSchema::builder("t.v1", "t")
            .field(FieldSpec::integer("id"))
            .field(FieldSpec::boolean("infinite_supply").default_value(MappedValue::Boolean(false)))
            .field(FieldSpec::decimal("tvl").nullable())
            .build()
            .unwrap();
        let record = map(&payload(json!({"id": 5})), &schema).unwrap();
        assert_eq!(record.get("infinite_supply"), Some(&MappedValue::Boolean(false)));
        assert_eq!(record.get("tvl"), Some(&MappedValue::Null));
    }

    #[test]
    fn test_alias_resolves_to_same_record() {
        let schema = TableSchema::builder("t.v1", "t")
            .field(FieldSpec::string("uuid"))
            .field(FieldSpec::decimal("volume_24h"))
            .rename("24hVolume", "volume_24h")
            .build()
            .unwrap();
        let legacy = map(&payload(json!({"uuid": "a", "24hVolume": "47603655385"})), &schema).unwrap();
        let current = map(&payload(json!({"uuid": "a", "volume_24h": 47603655385.0})), &schema).unwrap();
        assert_eq!(legacy, current);
    }

    #[test]
    fn test_current_key_wins_over_alias() {
        let schema = TableSchema::builder("t.v1", "t")
            .field(FieldSpec::decimal("volume_24h").alias("24hVolume"))
            .build()
            .unwrap();
        let record = map(&payload(json!({"volume_24h": 2.0, "24hVolume": 1.0})), &schema).unwrap();
        assert_eq!(record.get("volume_24h"), Some(&MappedValue::Decimal(2.0)));
    }

    #[test]
    fn test_map_records_with_envelope_field() {
        let schema = TableSchema::builder("t.v1", "t")
            .records_at("data")
            .field(FieldSpec::timestamp("status").from_envelope("status.timestamp"))
            .field(FieldSpec::integer("id"))
            .build()
            .unwrap();
        let raw = payload(json!({
            "status": {"timestamp": "2024-10-07T08:07:44.594Z"},
            "data": [{"id": 1}, {"id": 1027}]
        }));
        let records = map_records(&raw, &schema).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("id"), Some(&MappedValue::Integer(1027)));
        assert_eq!(records[0].get("status"), records[1].get("status"));
    }

    #[test]
    fn test_map_records_all_or_nothing() {
        let schema = TableSchema::builder("t.v1", "t")
            .records_at("data")
            .field(FieldSpec::integer("id"))
            .build()
            .unwrap();
        let raw = payload(json!({"data": [{"id": 1}, {"name": "no id"}]}));
        let err = map_records(&raw, &schema).unwrap_err();
        assert_eq!(err, MappingError::MissingRequiredField("id".to_string()));
    }

    #[test]
    fn test_map_records_falls_back_to_single_record() {
        let schema = TableSchema::builder("t.v1", "t")
            .records_at("data.coins")
            .field(FieldSpec::string("uuid"))
            .build()
            .unwrap();
        let records = map_records(&payload(json!({"uuid": "Qwsogvtv82FCd"})), &schema).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_map_records_rejects_non_array() {
        let schema = TableSchema::builder("t.v1", "t")
            .records_at("data")
            .field(FieldSpec::integer("id"))
            .build()
            .unwrap();
        let err = map_records(&payload(json!({"data": {"id": 1}})), &schema).unwrap_err();
        assert!(matches!(err, MappingError::TypeMismatch { expected: "array", .. }));
    }

    #[test]
    fn test_map_records_empty_array_maps_nothing() {
        let schema = TableSchema::builder("t.v1", "t")
            .records_at("data.coins")
            .field(FieldSpec::string("uuid"))
            .build()
            .unwrap();
        let empty = json!({"status": "success", "data": {"coins": []}});
        assert_eq!(map_records(&payload(empty), &schema).unwrap(), Vec::new());
    }

    #[test]
    fn test_content_hash_ignores_encoding() {
        let schema = TableSchema::builder("t.v1", "t")
            .field(FieldSpec::string("record_hash").content_hash())
            .field(FieldSpec::decimal("price"))
            .build()
            .unwrap();
        let a = map(&payload(json!({"price": "61161.70"})), &schema).unwrap();
        let b = map(&payload(json!({"price": 61161.70})), &schema).unwrap();
        let c = map(&payload(json!({"price": 1.0})), &schema).unwrap();
        assert_eq!(a.get("record_hash"), b.get("record_hash"));
        assert_ne!(a.get("record_hash"), c.get("record_hash"));
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let raw = payload(json!({
            "id": "1", "name": "Bitcoin", "symbol": "BTC",
            "quote": {"USD": {"price": "63611.48"}}
        }));
        let schema = price_schema();
        assert_eq!(map(&raw, &schema), map(&raw, &schema));
    }

    #[test]
    fn test_record_to_json() {
        let raw = payload(json!({
            "id": 1, "name": "Bitcoin", "symbol": "BTC",
            "quote": {"USD": {"price": 63611.48}}
        }));
        let record = map(&raw, &price_schema()).unwrap();
        assert_eq!(
            record.to_json(),
            json!({"id": 1, "name": "Bitcoin", "symbol": "BTC", "price": 63611.48})
        );
    }
}
