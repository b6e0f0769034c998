//! Input validation and sanitization utilities.
//!
//! Schema definitions, configuration and CLI arguments all end up in SQL
//! statements or object-store keys. These checks run once, when a schema is
//! built or an archive key is formed, so later stages can trust the names.
//!
//! # Security
//!
//! Input validation prevents:
//! - SQL injection via malicious table/column names
//! - Path traversal via malicious archive keys

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length for table names
pub const MAX_TABLE_NAME_LENGTH: usize = 63;

/// Maximum length for column names
pub const MAX_COLUMN_NAME_LENGTH: usize = 63;

/// Maximum length for schema ids and object keys
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Errors that can occur during input validation.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum ValidationError {
    /// Input is empty when a value is required
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    /// Input exceeds maximum allowed length
    #[error("{field} exceeds maximum length (max: {max}, got: {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// Input contains invalid characters
    #[error("{field} contains invalid characters: {reason}")]
    InvalidCharacters { field: &'static str, reason: String },

    /// Input has invalid format
    #[error("{0}: {1}")]
    InvalidFormat(&'static str, String),

    /// Input is a reserved word
    #[error("{field} cannot be a reserved word: {word}")]
    ReservedWord { field: &'static str, word: String },
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a table name.
///
/// # Rules
///
/// - Must not be empty
/// - Must not exceed 63 characters (the PostgreSQL identifier limit)
/// - Must start with an ASCII letter or underscore
/// - May contain ASCII letters, digits and underscores
/// - Cannot be a SQL reserved word
///
/// # Examples
///
/// ```
/// use coin_ingest::validation::input::validate_table_name;
///
/// assert!(validate_table_name("coin_cryptos").is_ok());
/// assert!(validate_table_name("").is_err());
/// assert!(validate_table_name("123_invalid").is_err());
/// assert!(validate_table_name("select").is_err());
/// ```
pub fn validate_table_name(name: &str) -> ValidationResult<()> {
    validate_sql_identifier(name, "table name", MAX_TABLE_NAME_LENGTH)
}

/// Validate a column name.
///
/// Same rules as [`validate_table_name`]. Nested upstream keys are flattened
/// by the schema (`quote.USD.price` lands in `price`), so dots are not allowed.
///
/// # Examples
///
/// ```
/// use coin_ingest::validation::input::validate_column_name;
///
/// assert!(validate_column_name("volume_24h").is_ok());
/// assert!(validate_column_name("24hVolume").is_err());
/// assert!(validate_column_name("quote.USD.price").is_err());
/// ```
pub fn validate_column_name(name: &str) -> ValidationResult<()> {
    validate_sql_identifier(name, "column name", MAX_COLUMN_NAME_LENGTH)
}

fn validate_sql_identifier(name: &str, field: &'static str, max: usize) -> ValidationResult<()> {
    let Some(first_char) = name.chars().next() else {
        return Err(ValidationError::Empty(field));
    };

    if name.len() > max {
        return Err(ValidationError::TooLong {
            field,
            max,
            actual: name.len(),
        });
    }

    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        return Err(ValidationError::InvalidFormat(
            field,
            "must start with a letter or underscore".to_string(),
        ));
    }

    if let Some(c) = name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(ValidationError::InvalidCharacters {
            field,
            reason: format!("invalid character: '{}'", c),
        });
    }

    if is_sql_reserved_word(name) {
        return Err(ValidationError::ReservedWord {
            field,
            word: name.to_string(),
        });
    }

    Ok(())
}

/// Validate a schema id such as `coin_cryptos.v1`.
///
/// Letters, digits, underscores, hyphens and dots; must start with a letter.
pub fn validate_schema_id(id: &str) -> ValidationResult<()> {
    let Some(first_char) = id.chars().next() else {
        return Err(ValidationError::Empty("schema id"));
    };

    if id.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::TooLong {
            field: "schema id",
            max: MAX_IDENTIFIER_LENGTH,
            actual: id.len(),
        });
    }

    if !first_char.is_ascii_alphabetic() {
        return Err(ValidationError::InvalidFormat(
            "schema id",
            "must start with a letter".to_string(),
        ));
    }

    if let Some(c) = id
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '_' | '-' | '.'))
    {
        return Err(ValidationError::InvalidCharacters {
            field: "schema id",
            reason: format!("invalid character: '{}'", c),
        });
    }

    Ok(())
}

/// Validate an archive object key such as `Minute/2024-10-07T08-07-44.json`.
///
/// Keys are `/`-separated. Empty segments, `.`/`..` segments, backslashes and
/// control characters are rejected so a key can never escape the archive root.
///
/// # Examples
///
/// ```
/// use coin_ingest::validation::input::validate_object_key;
///
/// assert!(validate_object_key("Month/2024-09-consolidated.json").is_ok());
/// assert!(validate_object_key("../etc/passwd").is_err());
/// assert!(validate_object_key("/absolute").is_err());
/// ```
pub fn validate_object_key(key: &str) -> ValidationResult<()> {
    if key.is_empty() {
        return Err(ValidationError::Empty("object key"));
    }

    if key.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::TooLong {
            field: "object key",
            max: MAX_IDENTIFIER_LENGTH,
            actual: key.len(),
        });
    }

    if let Some(c) = key.chars().find(|c| c.is_control() || *c == '\\') {
        return Err(ValidationError::InvalidCharacters {
            field: "object key",
            reason: format!("invalid character: {:?}", c),
        });
    }

    for segment in key.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(ValidationError::InvalidFormat(
                "object key",
                format!("invalid path segment '{}'", segment),
            ));
        }
    }

    Ok(())
}

/// Sanitize a SQL identifier by quoting it.
///
/// Both supported dialects (DuckDB and PostgreSQL) use standard double-quote
/// quoting; internal quotes are doubled.
///
/// # Examples
///
/// ```
/// use coin_ingest::validation::input::sanitize_sql_identifier;
///
/// assert_eq!(sanitize_sql_identifier("coin_cryptos"), "\"coin_cryptos\"");
/// assert_eq!(sanitize_sql_identifier("a\"b"), "\"a\"\"b\"");
/// ```
pub fn sanitize_sql_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Check if a word is a SQL reserved word.
///
/// This is a basic check covering common reserved words across SQL dialects.
fn is_sql_reserved_word(word: &str) -> bool {
    const RESERVED_WORDS: &[&str] = &[
        "select",
        "from",
        "where",
        "insert",
        "update",
        "delete",
        "create",
        "drop",
        "alter",
        "table",
        "index",
        "view",
        "database",
        "schema",
        "grant",
        "revoke",
        "commit",
        "rollback",
        "begin",
        "end",
        "transaction",
        "primary",
        "foreign",
        "key",
        "references",
        "constraint",
        "unique",
        "check",
        "default",
        "not",
        "null",
        "and",
        "or",
        "in",
        "between",
        "like",
        "is",
        "case",
        "when",
        "then",
        "else",
        "as",
        "on",
        "join",
        "inner",
        "outer",
        "left",
        "right",
        "full",
        "cross",
        "natural",
        "using",
        "group",
        "by",
        "having",
        "order",
        "asc",
        "desc",
        "limit",
        "offset",
        "union",
        "intersect",
        "except",
        "all",
        "distinct",
        "top",
        "values",
        "set",
        "into",
        "exec",
        "execute",
        "procedure",
        "function",
        "trigger",
        "true",
        "false",
        "int",
        "integer",
        "varchar",
        "char",
        "text",
        "boolean",
        "date",
        "time",
        "timestamp",
        "float",
        "double",
        "decimal",
        "numeric",
    ];

    let lower = word.to_lowercase();
    RESERVED_WORDS.contains(&lower.as_str())
}
