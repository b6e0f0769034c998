//! Validation functionality
//!
//! Provides input validation and sanitization (security) for identifiers that
//! reach SQL statements and archive object keys.

pub mod input;

pub use input::{
    ValidationError, sanitize_sql_identifier, validate_column_name, validate_object_key,
    validate_schema_id, validate_table_name,
};
