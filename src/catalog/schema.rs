//! Column definitions and the default schema registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};
use crate::types::DataType;

use super::{Schema, SchemaProvider};

/// Column produced by a schema method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub ordinal: usize,
    pub data_type: DataType,
}

impl ColumnDef {
    /// Creates a new column definition.
    #[must_use]
    pub fn new(name: impl Into<String>, ordinal: usize, data_type: DataType) -> Self {
        ColumnDef {
            name: name.into(),
            ordinal,
            data_type,
        }
    }

    /// Builds an ordinal-numbered column list from `(name, type)` pairs.
    #[must_use]
    pub fn list<S: Into<String>>(columns: impl IntoIterator<Item = (S, DataType)>) -> Vec<Self> {
        columns
            .into_iter()
            .enumerate()
            .map(|(ordinal, (name, data_type))| ColumnDef::new(name, ordinal, data_type))
            .collect()
    }
}

/// Registry of schemas by name. Safe to share between concurrent compilations.
#[derive(Debug, Default)]
pub struct Catalog {
    schemas: RwLock<HashMap<String, Arc<dyn Schema>>>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema under its own name.
    ///
    /// # Errors
    ///
    /// Returns an error if a schema with the same name is already registered.
    pub fn register(&self, schema: Arc<dyn Schema>) -> Result<()> {
        let key = schema.name().to_lowercase();
        let mut schemas = self.schemas.write();
        if schemas.contains_key(&key) {
            return Err(QuarryError::SchemaError(format!(
                "Schema '{}' already exists",
                schema.name()
            )));
        }
        schemas.insert(key, schema);
        Ok(())
    }

    /// Registers a schema, builder style.
    ///
    /// # Errors
    ///
    /// Returns an error if a schema with the same name is already registered.
    pub fn with_schema(self, schema: Arc<dyn Schema>) -> Result<Self> {
        self.register(schema)?;
        Ok(self)
    }

    /// Removes a schema, returning it if present.
    pub fn deregister(&self, name: &str) -> Option<Arc<dyn Schema>> {
        self.schemas.write().remove(&name.to_lowercase())
    }

    /// Returns the registered schema names, sorted.
    #[must_use]
    pub fn schema_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .schemas
            .read()
            .values()
            .map(|s| s.name().to_string())
            .collect();
        names.sort();
        names
    }
}

impl SchemaProvider for Catalog {
    fn get_schema(&self, name: &str) -> Option<Arc<dyn Schema>> {
        self.schemas.read().get(&name.to_lowercase()).cloned()
    }
}
