//! Schema providers: the capability the binder resolves sources against and
//! the runtime reads rows from.
//!
//! A source written `#schema.method(args) alias` is resolved in two steps:
//! the provider maps `schema` to a [`Schema`], and the schema maps
//! `method(args)` to an ordered column list. The same schema later produces
//! the rows for those columns.

mod file;
mod memory;
mod schema;
mod system;

use std::fmt;
use std::sync::Arc;

pub use file::{CsvOptions, CsvSchema};
pub use memory::MemorySchema;
pub use schema::{Catalog, ColumnDef};
pub use system::SystemSchema;

use crate::error::Result;
use crate::types::Value;

/// A named family of table-producing methods.
pub trait Schema: Send + Sync + fmt::Debug {
    /// Returns the schema name.
    fn name(&self) -> &str;

    /// Resolves a method and its literal arguments to an ordered column list.
    ///
    /// # Errors
    ///
    /// Returns an error if the method does not exist or rejects the arguments.
    fn get_table(&self, method: &str, args: &[Value]) -> Result<Vec<ColumnDef>>;

    /// Produces the rows of a method, laid out as [`Schema::get_table`] describes.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows cannot be produced.
    fn rows(&self, method: &str, args: &[Value]) -> Result<Vec<Vec<Value>>>;
}

/// Maps schema names to schemas.
pub trait SchemaProvider: Send + Sync {
    /// Looks up a schema by name (case-insensitive).
    fn get_schema(&self, name: &str) -> Option<Arc<dyn Schema>>;
}
