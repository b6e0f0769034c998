//! Destination schemas
//!
//! Declarative table definitions the field mapper targets. New payload shapes
//! are supported by registering a new [`TableSchema`], not by writing new
//! mapping code.

pub mod builtin;
pub mod field;
pub mod registry;
pub mod table;

pub use builtin::{COIN_CRYPTOS_V1, COIN_RANKING_V1};
pub use field::{FieldSource, FieldSpec, Scope, SemanticType};
pub use registry::{SchemaRegistry, SchemaRegistryBuilder};
pub use table::{Rename, TableSchema, TableSchemaBuilder};

/// Error type for schema definition and lookup
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// No schema registered under this id
    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    /// A schema id was registered twice
    #[error("Schema already registered: {0}")]
    DuplicateSchema(String),

    /// Two columns share a name
    #[error("Duplicate column '{column}' in table {table}")]
    DuplicateColumn { table: String, column: String },

    /// A table or column name is not a safe SQL identifier
    #[error("Invalid identifier in schema {schema}: {reason}")]
    InvalidIdentifier { schema: String, reason: String },

    /// A primary key column is missing or nullable
    #[error("Primary key column '{column}' of table {table} must exist and be non-nullable")]
    InvalidPrimaryKey { table: String, column: String },

    /// A default value does not match its column type
    #[error("Default for column '{column}' of table {table} does not match its type")]
    InvalidDefault { table: String, column: String },

    /// A rename targets a key no column reads
    #[error("Rename target '{key}' is not a source path of any column in table {table}")]
    InvalidRename { table: String, key: String },

    /// A required part of the definition is empty
    #[error("{0} cannot be empty")]
    Empty(String),
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
