//! Filter operator for WHERE and HAVING clauses.

use crate::codegen::CompiledExpr;
use crate::error::Result;
use crate::executor::eval::{evaluate, is_true};
use crate::executor::{Frame, PhysicalOperator};

/// Keeps frames whose predicate evaluates to `TRUE`.
///
/// The frame's cache travels on with it, so slots filled by the predicate
/// are reused by later operators on the same row.
pub struct FilterOperator {
    child: Box<dyn PhysicalOperator>,
    predicate: CompiledExpr,
}

impl FilterOperator {
    /// Creates a new filter operator with the given child and predicate.
    #[must_use]
    pub fn new(child: Box<dyn PhysicalOperator>, predicate: CompiledExpr) -> Self {
        FilterOperator { child, predicate }
    }
}

impl PhysicalOperator for FilterOperator {
    fn next(&mut self) -> Result<Option<Frame>> {
        while let Some(mut frame) = self.child.next()? {
            if is_true(&evaluate(&self.predicate, &frame.values, &mut frame.cache)?) {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }
}
