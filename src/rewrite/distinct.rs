//! DISTINCT to GROUP BY desugaring.

use crate::ast::{GroupByClause, SelectQuery, Statement};
use crate::binder::ScopeTree;
use crate::error::{Result, StructuralError};
use crate::visit::{fold_select_parts, Folder};

use super::{needs_grouping, Rewriter, Transformed};

/// Rewrites `SELECT DISTINCT a, b` into `SELECT a, b GROUP BY a, b`.
///
/// Grouped or aggregating queries keep their DISTINCT flag; the runtime
/// deduplicates their projected rows instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistinctToGroupBy;

impl Rewriter for DistinctToGroupBy {
    fn name(&self) -> &'static str {
        "distinct_to_group_by"
    }

    fn rewrite(&self, statement: &Statement, _scopes: &ScopeTree) -> Result<Transformed<Statement>> {
        let mut folder = DistinctFolder { changed: 0 };
        let statement = folder.fold_statement(statement)?;
        Ok(Transformed::from_count(statement, folder.changed))
    }
}

struct DistinctFolder {
    changed: usize,
}

impl Folder for DistinctFolder {
    fn pass_name(&self) -> &'static str {
        "distinct_to_group_by"
    }

    fn fold_select(&mut self, select: &SelectQuery) -> Result<SelectQuery> {
        let mut folded = fold_select_parts(self, select)?;
        if !folded.distinct {
            return Ok(folded);
        }
        if folded.fields.is_empty() {
            return Err(StructuralError::DistinctWithoutFields.into());
        }
        if needs_grouping(&folded) {
            return Ok(folded);
        }
        folded.group_by = Some(GroupByClause {
            keys: folded.fields.iter().map(|f| f.expr.clone()).collect(),
            having: None,
            aggregates: Vec::new(),
        });
        folded.distinct = false;
        self.changed += 1;
        Ok(folded)
    }
}
