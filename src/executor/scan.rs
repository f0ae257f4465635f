//! Source scan operator.

use crate::error::{QuarryError, Result};
use crate::executor::{Frame, PhysicalOperator};
use crate::types::Value;

/// Scan over rows materialized from a schema method, CTE or subquery.
pub struct ScanOperator {
    alias: String,
    width: usize,
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl ScanOperator {
    /// Creates a scan that checks every row has `width` values.
    #[must_use]
    pub fn new(alias: impl Into<String>, width: usize, rows: Vec<Vec<Value>>) -> Self {
        ScanOperator {
            alias: alias.into(),
            width,
            rows: rows.into_iter(),
        }
    }
}

impl PhysicalOperator for ScanOperator {
    fn next(&mut self) -> Result<Option<Frame>> {
        let Some(row) = self.rows.next() else {
            return Ok(None);
        };
        if row.len() != self.width {
            return Err(QuarryError::ExecutionError(format!(
                "Source '{}' produced a row of {} value(s), expected {}",
                self.alias,
                row.len(),
                self.width
            )));
        }
        Ok(Some(Frame::new(row)))
    }
}
