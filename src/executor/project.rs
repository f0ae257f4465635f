//! Projection operator for SELECT fields.

use crate::codegen::CompiledExpr;
use crate::error::Result;
use crate::executor::eval::evaluate;
use crate::executor::{Frame, PhysicalOperator};

/// Materializes the selected fields of each frame, left to right.
///
/// ORDER BY keys are computed here as well, against the same input row and
/// cache, and ride along on the output frame.
pub struct ProjectOperator {
    child: Box<dyn PhysicalOperator>,
    projections: Vec<CompiledExpr>,
    sort_keys: Vec<CompiledExpr>,
}

impl ProjectOperator {
    /// Creates a new project operator with the given child and projections.
    #[must_use]
    pub fn new(
        child: Box<dyn PhysicalOperator>,
        projections: Vec<CompiledExpr>,
        sort_keys: Vec<CompiledExpr>,
    ) -> Self {
        ProjectOperator {
            child,
            projections,
            sort_keys,
        }
    }
}

impl PhysicalOperator for ProjectOperator {
    fn next(&mut self) -> Result<Option<Frame>> {
        let Some(mut input) = self.child.next()? else {
            return Ok(None);
        };
        let values = self
            .projections
            .iter()
            .map(|p| evaluate(p, &input.values, &mut input.cache))
            .collect::<Result<Vec<_>>>()?;
        let sort_keys = self
            .sort_keys
            .iter()
            .map(|k| evaluate(k, &input.values, &mut input.cache))
            .collect::<Result<Vec<_>>>()?;
        let mut output = Frame::new(values);
        output.sort_keys = sort_keys;
        Ok(Some(output))
    }
}
