//! Schema registry
//!
//! Lookup-only collection of [`TableSchema`]s. A registry is assembled once at
//! process start and never mutated afterwards; a changed column set is a new
//! schema id, never an edit of an existing one.

use std::collections::HashMap;
use std::sync::Arc;

use super::table::TableSchema;
use super::{SchemaError, SchemaResult, builtin};

/// Immutable set of registered schemas
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<TableSchema>>,
}

impl SchemaRegistry {
    /// Start an empty registry
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Registry holding the built-in coin listing and coin ranking schemas
    pub fn builtin() -> SchemaResult<Self> {
        Ok(Self::builder()
            .register(builtin::coin_cryptos_v1()?)?
            .register(builtin::coin_ranking_v1()?)?
            .build())
    }

    /// Look up a schema by id
    pub fn get(&self, schema_id: &str) -> SchemaResult<Arc<TableSchema>> {
        self.schemas
            .get(schema_id)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownSchema(schema_id.to_string()))
    }

    /// Whether `schema_id` is registered
    pub fn contains(&self, schema_id: &str) -> bool {
        self.schemas.contains_key(schema_id)
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Builder for [`SchemaRegistry`]
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    schemas: HashMap<String, Arc<TableSchema>>,
}

impl SchemaRegistryBuilder {
    /// Register a schema. Registering the same id twice is an error.
    pub fn register(mut self, schema: TableSchema) -> SchemaResult<Self> {
        let id = schema.id().to_string();
        if self.schemas.contains_key(&id) {
            return Err(SchemaError::DuplicateSchema(id));
        }
        self.schemas.insert(id, Arc::new(schema));
        Ok(self)
    }

    pub fn build(self) -> SchemaRegistry {
        SchemaRegistry {
            schemas: self.schemas,
        }
    }
}
