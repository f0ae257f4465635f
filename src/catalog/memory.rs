//! In-memory collections exposed as a schema.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{QuarryError, Result};
use crate::types::{DataType, Value};

use super::{ColumnDef, Schema};

#[derive(Debug, Clone)]
struct MemoryTable {
    columns: Vec<ColumnDef>,
    rows: Vec<Vec<Value>>,
}

/// Schema whose methods are named in-memory collections.
///
/// Each collection is addressed as `#name.collection()` and takes no arguments.
#[derive(Debug)]
pub struct MemorySchema {
    name: String,
    tables: RwLock<HashMap<String, MemoryTable>>,
}

impl MemorySchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        MemorySchema {
            name: name.into(),
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Adds a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if a row's width differs from the column count, or a
    /// value does not fit its column type.
    pub fn add_table<S: Into<String>>(
        &self,
        name: &str,
        columns: Vec<(S, DataType)>,
        rows: Vec<Vec<Value>>,
    ) -> Result<()> {
        let columns = ColumnDef::list(columns);
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(QuarryError::SchemaError(format!(
                    "Row {idx} of '{name}' has {} values, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
            for (value, column) in row.iter().zip(&columns) {
                if !fits(value, &column.data_type) {
                    return Err(QuarryError::SchemaError(format!(
                        "Row {idx} of '{name}': value {value} does not fit column '{}' of type {}",
                        column.name, column.data_type
                    )));
                }
            }
        }
        self.tables
            .write()
            .insert(name.to_lowercase(), MemoryTable { columns, rows });
        Ok(())
    }

    /// Adds a collection, builder style.
    ///
    /// # Errors
    ///
    /// See [`MemorySchema::add_table`].
    pub fn with_table<S: Into<String>>(
        self,
        name: &str,
        columns: Vec<(S, DataType)>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self> {
        self.add_table(name, columns, rows)?;
        Ok(self)
    }

    fn table(&self, method: &str, args: &[Value]) -> Result<MemoryTable> {
        if !args.is_empty() {
            return Err(QuarryError::SchemaError(format!(
                "Collection '{method}' takes no arguments, got {}",
                args.len()
            )));
        }
        self.tables
            .read()
            .get(&method.to_lowercase())
            .cloned()
            .ok_or_else(|| {
                QuarryError::SchemaError(format!(
                    "Collection '{method}' does not exist in schema '{}'",
                    self.name
                ))
            })
    }
}

fn fits(value: &Value, data_type: &DataType) -> bool {
    match (value.data_type(), data_type) {
        (None | Some(DataType::Any), _) | (_, DataType::Any) => true,
        (Some(DataType::Array(_)), DataType::Array(_)) => true,
        (Some(actual), expected) => {
            actual == *expected || actual.common_ancestor(expected) == *expected
        }
    }
}

impl Schema for MemorySchema {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_table(&self, method: &str, args: &[Value]) -> Result<Vec<ColumnDef>> {
        Ok(self.table(method, args)?.columns)
    }

    fn rows(&self, method: &str, args: &[Value]) -> Result<Vec<Vec<Value>>> {
        Ok(self.table(method, args)?.rows)
    }
}
