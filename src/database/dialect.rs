//! SQL rendering per backend
//!
//! Statements are built from schema metadata only: identifiers come from a
//! validated [`TableSchema`] and are quoted, and every value is a bind
//! parameter. No value text is ever concatenated into SQL.

use crate::schema::{SemanticType, TableSchema};
use crate::validation::sanitize_sql_identifier;

/// SQL dialect of a record store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    DuckDb,
    Postgres,
}

impl SqlDialect {
    /// Column type for a semantic type
    pub fn column_type(&self, semantic_type: SemanticType) -> String {
        match (self, semantic_type) {
            (_, SemanticType::Integer) => "BIGINT".to_string(),
            // Mapped decimals are f64
            (SqlDialect::DuckDb, SemanticType::Decimal) => "DOUBLE".to_string(),
            (SqlDialect::Postgres, SemanticType::Decimal) => "DOUBLE PRECISION".to_string(),
            (_, SemanticType::Boolean) => "BOOLEAN".to_string(),
            (SqlDialect::DuckDb, SemanticType::String) => "VARCHAR".to_string(),
            (SqlDialect::Postgres, SemanticType::String) => "TEXT".to_string(),
            (SqlDialect::DuckDb, SemanticType::Timestamp) => "TIMESTAMP".to_string(),
            (SqlDialect::Postgres, SemanticType::Timestamp) => "TIMESTAMPTZ".to_string(),
            (SqlDialect::DuckDb, SemanticType::Json) => "VARCHAR".to_string(),
            (SqlDialect::Postgres, SemanticType::Json) => "JSON".to_string(),
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` for the schema
    pub fn create_table_sql(&self, schema: &TableSchema) -> String {
        let mut definitions: Vec<String> = schema
            .fields()
            .iter()
            .map(|field| {
                let mut definition = format!(
                    "{} {}",
                    sanitize_sql_identifier(&field.name),
                    self.column_type(field.semantic_type)
                );
                if !field.nullable {
                    definition.push_str(" NOT NULL");
                }
                definition
            })
            .collect();

        if !schema.primary_key().is_empty() {
            let key: Vec<String> = schema
                .primary_key()
                .iter()
                .map(|column| sanitize_sql_identifier(column))
                .collect();
            definitions.push(format!("PRIMARY KEY ({})", key.join(", ")));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            sanitize_sql_identifier(schema.table()),
            definitions.join(",\n    ")
        )
    }

    /// Parameterized `INSERT` binding every column in declaration order
    pub fn insert_sql(&self, schema: &TableSchema) -> String {
        let columns: Vec<String> = schema
            .column_names()
            .map(sanitize_sql_identifier)
            .collect();

        let placeholders: Vec<String> = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(i, field)| self.placeholder(i + 1, field.semantic_type))
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            sanitize_sql_identifier(schema.table()),
            columns.join(", "),
            placeholders.join(", ")
        )
    }

    // Postgres infers parameter types from the placeholder; casts let decimals
    // bind as float8 and JSON bind as text.
    fn placeholder(&self, position: usize, semantic_type: SemanticType) -> String {
        match self {
            SqlDialect::DuckDb => "?".to_string(),
            SqlDialect::Postgres => match semantic_type {
                SemanticType::Decimal => format!("${}::float8", position),
                SemanticType::Json => format!("${}::text::json", position),
                _ => format!("${}", position),
            },
        }
    }
}
