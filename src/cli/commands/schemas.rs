//! Schemas command
//!
//! Lists the registered schemas, or prints one schema's columns and DDL.

use crate::cli::backends::dialect_for;
use crate::cli::error::CliError;
use crate::config::DatabaseBackendType;
use crate::schema::{FieldSource, SchemaRegistry, TableSchema};

/// Schemas command arguments
#[derive(Debug, Clone)]
pub struct SchemasArgs {
    /// Schema to describe; all schemas are listed when absent
    pub schema: Option<String>,
    /// Dialect the DDL is rendered in (duckdb, postgres)
    pub dialect: String,
}

pub fn handle_schemas(args: &SchemasArgs) -> Result<(), CliError> {
    let registry = SchemaRegistry::builtin()?;

    match &args.schema {
        None => println!("{}", list_schemas(&registry)),
        Some(schema_id) => {
            let backend: DatabaseBackendType = args
                .dialect
                .parse()
                .map_err(CliError::InvalidArgument)?;
            let schema = registry.get(schema_id)?;
            println!("{}", describe_schema(&schema, backend));
        }
    }
    Ok(())
}

/// One line per schema: id, table, column count, primary key
pub fn list_schemas(registry: &SchemaRegistry) -> String {
    let mut lines = vec![format!(
        "{:<20} {:<16} {:>7}  primary key",
        "schema", "table", "columns"
    )];
    for id in registry.ids() {
        if let Ok(schema) = registry.get(id) {
            lines.push(format!(
                "{:<20} {:<16} {:>7}  ({})",
                schema.id(),
                schema.table(),
                schema.fields().len(),
                schema.primary_key().join(", ")
            ));
        }
    }
    lines.join("\n")
}

/// Column table followed by the `CREATE TABLE` statement
pub fn describe_schema(schema: &TableSchema, backend: DatabaseBackendType) -> String {
    let mut out = format!("{} -> {}\n", schema.id(), schema.table());
    if let Some(path) = schema.records_at() {
        out.push_str(&format!("records at: {}\n", path));
    }
    out.push('\n');

    for field in schema.fields() {
        let source = match &field.source {
            FieldSource::ContentHash => "<content hash>".to_string(),
            FieldSource::Path { .. } => field.source.candidates().collect::<Vec<_>>().join(" | "),
        };
        out.push_str(&format!(
            "  {:<34} {:<10} {:<9} {}\n",
            field.name,
            field.semantic_type,
            if field.nullable { "null" } else { "not null" },
            source
        ));
    }

    out.push('\n');
    out.push_str(&dialect_for(backend).create_table_sql(schema));
    out.push(';');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{COIN_CRYPTOS_V1, COIN_RANKING_V1};

    #[test]
    fn test_list_contains_builtin_schemas() {
        let registry = SchemaRegistry::builtin().unwrap();
        let listing = list_schemas(&registry);
        assert!(listing.contains(COIN_CRYPTOS_V1));
        assert!(listing.contains(COIN_RANKING_V1));
        assert!(listing.contains("(record_hash)"));
    }

    #[test]
    fn test_describe_renders_ddl() {
        let registry = SchemaRegistry::builtin().unwrap();
        let schema = registry.get(COIN_RANKING_V1).unwrap();
        let text = describe_schema(&schema, DatabaseBackendType::Postgres);
        assert!(text.contains("CREATE TABLE IF NOT EXISTS \"coin_ranking\""));
        assert!(text.contains("volume_24h | 24hVolume"));
        assert!(text.contains("<content hash>"));
    }
}
