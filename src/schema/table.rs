//! Table schemas
//!
//! A [`TableSchema`] is an ordered, immutable set of [`FieldSpec`]s bound to a
//! destination table. Schemas are assembled with [`TableSchemaBuilder`], which
//! checks identifiers, column uniqueness, primary keys and defaults once, so a
//! built schema can be trusted by the mapper and the writers.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::field::{FieldSource, FieldSpec, Scope};
use super::{SchemaError, SchemaResult};
use crate::validation::input::{validate_column_name, validate_schema_id, validate_table_name};

/// A legacy upstream key and the key it was renamed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rename {
    pub legacy: String,
    pub current: String,
}

/// Immutable destination table definition
///
/// Deserialization goes through [`TableSchemaBuilder::build`], so a schema
/// read from JSON or TOML is validated like a built one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableSchemaBuilder")]
pub struct TableSchema {
    id: String,
    table: String,
    fields: Vec<FieldSpec>,
    primary_key: Vec<String>,
    records_at: Option<String>,
    renames: Vec<Rename>,
}

impl TableSchema {
    /// Start building a schema with the given id and destination table
    pub fn builder(id: impl Into<String>, table: impl Into<String>) -> TableSchemaBuilder {
        TableSchemaBuilder::new(id, table)
    }

    /// Versioned schema identifier, e.g. `coin_cryptos.v1`
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Destination table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Columns in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Look up a column by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Column names in declaration order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Primary key columns (may be empty)
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Path of the record array inside the envelope, if any
    pub fn records_at(&self) -> Option<&str> {
        self.records_at.as_deref()
    }

    /// Rename table applied to this schema
    pub fn renames(&self) -> &[Rename] {
        &self.renames
    }
}

/// Builder for [`TableSchema`]
#[derive(Debug, Clone, Deserialize)]
pub struct TableSchemaBuilder {
    id: String,
    table: String,
    fields: Vec<FieldSpec>,
    #[serde(default)]
    primary_key: Vec<String>,
    #[serde(default)]
    records_at: Option<String>,
    #[serde(default)]
    renames: Vec<Rename>,
}

impl TableSchemaBuilder {
    pub fn new(id: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            table: table.into(),
            fields: Vec::new(),
            primary_key: Vec::new(),
            records_at: None,
            renames: Vec::new(),
        }
    }

    /// Append a column
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Append several columns
    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldSpec>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Declare the primary key
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Records live in the array at `path`; one row per element
    pub fn records_at(mut self, path: impl Into<String>) -> Self {
        self.records_at = Some(path.into());
        self
    }

    /// Resolve the upstream key `legacy` wherever `current` is expected
    pub fn rename(mut self, legacy: impl Into<String>, current: impl Into<String>) -> Self {
        self.renames.push(Rename {
            legacy: legacy.into(),
            current: current.into(),
        });
        self
    }

    /// Validate and freeze the schema
    pub fn build(mut self) -> SchemaResult<TableSchema> {
        validate_schema_id(&self.id).map_err(|e| SchemaError::InvalidIdentifier {
            schema: self.id.clone(),
            reason: e.to_string(),
        })?;
        validate_table_name(&self.table).map_err(|e| SchemaError::InvalidIdentifier {
            schema: self.id.clone(),
            reason: e.to_string(),
        })?;
        if self.fields.is_empty() {
            return Err(SchemaError::Empty(format!("columns of schema {}", self.id)));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            validate_column_name(&field.name).map_err(|e| SchemaError::InvalidIdentifier {
                schema: self.id.clone(),
                reason: e.to_string(),
            })?;
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    table: self.table.clone(),
                    column: field.name.clone(),
                });
            }
            if let Some(default) = &field.default
                && !default.conforms_to(field.semantic_type, field.nullable)
            {
                return Err(SchemaError::InvalidDefault {
                    table: self.table.clone(),
                    column: field.name.clone(),
                });
            }
        }

        for column in &self.primary_key {
            match self.fields.iter().find(|f| &f.name == column) {
                Some(field) if !field.nullable => {}
                _ => {
                    return Err(SchemaError::InvalidPrimaryKey {
                        table: self.table.clone(),
                        column: column.clone(),
                    });
                }
            }
        }

        for rename in &self.renames {
            let mut applied = false;
            for field in &mut self.fields {
                if let FieldSource::Path {
                    scope: Scope::Record,
                    path,
                    aliases,
                } = &mut field.source
                    && *path == rename.current
                {
                    if !aliases.contains(&rename.legacy) {
                        aliases.push(rename.legacy.clone());
                    }
                    applied = true;
                }
            }
            if !applied {
                return Err(SchemaError::InvalidRename {
                    table: self.table.clone(),
                    key: rename.current.clone(),
                });
            }
        }

        Ok(TableSchema {
            id: self.id,
            table: self.table,
            fields: self.fields,
            primary_key: self.primary_key,
            records_at: self.records_at,
            renames: self.renames,
        })
    }
}

impl TryFrom<TableSchemaBuilder> for TableSchema {
    type Error = SchemaError;

    fn try_from(builder: TableSchemaBuilder) -> SchemaResult<Self> {
        builder.build()
    }
}
