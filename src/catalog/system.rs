//! Built-in `#system` schema.

use crate::error::{QuarryError, Result};
use crate::types::{DataType, Value};

use super::{ColumnDef, Schema};

/// Schema exposing `dual()` and `range(min, max)`.
#[derive(Debug, Default)]
pub struct SystemSchema;

impl SystemSchema {
    #[must_use]
    pub fn new() -> Self {
        SystemSchema
    }
}

fn range_bounds(args: &[Value]) -> Result<(i64, i64)> {
    match args {
        [Value::Int64(min), Value::Int64(max)] => Ok((*min, *max)),
        _ => Err(QuarryError::SchemaError(format!(
            "range expects (Int64, Int64), got {} argument(s)",
            args.len()
        ))),
    }
}

impl Schema for SystemSchema {
    fn name(&self) -> &str {
        "system"
    }

    fn get_table(&self, method: &str, args: &[Value]) -> Result<Vec<ColumnDef>> {
        match method.to_lowercase().as_str() {
            "dual" if args.is_empty() => Ok(vec![ColumnDef::new("dummy", 0, DataType::String)]),
            "range" => {
                range_bounds(args)?;
                Ok(vec![ColumnDef::new("value", 0, DataType::Int64)])
            }
            _ => Err(QuarryError::SchemaError(format!(
                "No method '{method}' taking {} argument(s) in schema 'system'",
                args.len()
            ))),
        }
    }

    fn rows(&self, method: &str, args: &[Value]) -> Result<Vec<Vec<Value>>> {
        match method.to_lowercase().as_str() {
            "dual" => Ok(vec![vec![Value::String(String::new())]]),
            "range" => {
                let (min, max) = range_bounds(args)?;
                Ok((min..max).map(|v| vec![Value::Int64(v)]).collect())
            }
            _ => Err(QuarryError::SchemaError(format!(
                "No method '{method}' in schema 'system'"
            ))),
        }
    }
}
