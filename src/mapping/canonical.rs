//! Canonical JSON serialisation
//!
//! Identical semantic content always produces byte-identical text: object
//! keys are emitted in sorted order at every depth and no insignificant
//! whitespace is written.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Serialise `value` canonically
pub fn to_canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// Lowercase hex SHA-256 of the canonical serialisation of `value`
pub fn content_hash(value: &Value) -> String {
    let digest = Sha256::digest(to_canonical_string(value).as_bytes());
    format!("{:x}", digest)
}

// Writes keys in sorted order directly, so the output does not depend on
// whether serde_json's map preserves insertion order.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
