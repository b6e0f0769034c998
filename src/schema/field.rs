//! Column definitions
//!
//! A [`FieldSpec`] declares one destination column: its name, semantic type,
//! nullability, where its value comes from in the raw payload, and an
//! optional default used when the source is absent.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::mapping::MappedValue;

/// Semantic type of a destination column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    /// 64-bit signed integer
    Integer,
    /// Decimal number, held as f64 and stored as a double
    Decimal,
    /// Boolean flag
    Boolean,
    /// Free text
    String,
    /// UTC instant
    Timestamp,
    /// Canonically serialised JSON document
    Json,
}

impl SemanticType {
    /// Lowercase type name used in errors and logs
    pub fn name(&self) -> &'static str {
        match self {
            SemanticType::Integer => "integer",
            SemanticType::Decimal => "decimal",
            SemanticType::Boolean => "boolean",
            SemanticType::String => "string",
            SemanticType::Timestamp => "timestamp",
            SemanticType::Json => "json",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which JSON object a source path is resolved against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// The record being mapped (an element of `records_at`, or the payload)
    #[default]
    Record,
    /// The whole message envelope
    Envelope,
}

/// Where a column's value is extracted from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldSource {
    /// A dotted path, e.g. `quote.USD.price`. Numeric segments index arrays.
    ///
    /// `aliases` are tried in order when `path` is absent, so that keys
    /// renamed between upstream API versions resolve to the same column.
    Path {
        scope: Scope,
        path: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        aliases: Vec<String>,
    },
    /// Lowercase hex SHA-256 of the canonical JSON of the other mapped columns
    ContentHash,
}

impl FieldSource {
    /// Candidate paths in resolution order (empty for derived sources)
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        let (path, aliases): (Option<&String>, &[String]) = match self {
            FieldSource::Path { path, aliases, .. } => (Some(path), aliases.as_slice()),
            FieldSource::ContentHash => (None, &[]),
        };
        path.into_iter()
            .chain(aliases.iter())
            .map(String::as_str)
    }
}

/// One destination column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Column name in the destination table
    pub name: String,
    /// Declared semantic type
    pub semantic_type: SemanticType,
    /// Whether NULL is an acceptable stored value
    pub nullable: bool,
    /// Extraction rule
    pub source: FieldSource,
    /// Value substituted when the source resolves to nothing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<MappedValue>,
}

impl FieldSpec {
    /// A required column read from the record key of the same name
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        let name = name.into();
        Self {
            source: FieldSource::Path {
                scope: Scope::Record,
                path: name.clone(),
                aliases: Vec::new(),
            },
            name,
            semantic_type,
            nullable: false,
            default: None,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::Integer)
    }

    pub fn decimal(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::Decimal)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::Boolean)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::String)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::Timestamp)
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::Json)
    }

    /// Read the value from `path` within the record
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.source = FieldSource::Path {
            scope: Scope::Record,
            path: path.into(),
            aliases: self.aliases().to_vec(),
        };
        self
    }

    /// Read the value from `path` within the message envelope
    pub fn from_envelope(mut self, path: impl Into<String>) -> Self {
        self.source = FieldSource::Path {
            scope: Scope::Envelope,
            path: path.into(),
            aliases: self.aliases().to_vec(),
        };
        self
    }

    /// Also accept `alias` when the primary path is absent
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        if let FieldSource::Path { aliases, .. } = &mut self.source {
            aliases.push(alias.into());
        }
        self
    }

    /// Derive the value from the record's content hash
    pub fn content_hash(mut self) -> Self {
        self.source = FieldSource::ContentHash;
        self
    }

    /// Allow NULL
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Substitute `value` when the source is absent
    pub fn default_value(mut self, value: MappedValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Primary source path, if this column reads from the payload
    pub fn source_path(&self) -> Option<&str> {
        match &self.source {
            FieldSource::Path { path, .. } => Some(path),
            FieldSource::ContentHash => None,
        }
    }

    fn aliases(&self) -> &[String] {
        match &self.source {
            FieldSource::Path { aliases, .. } => aliases,
            FieldSource::ContentHash => &[],
        }
    }
}
