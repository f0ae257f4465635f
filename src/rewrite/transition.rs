//! Join transition tables.
//!
//! After binding, a column of a joined source still names its own alias.
//! The runtime only sees one merged row per join, so every such access is
//! moved onto the scope's row alias and the merged column name `alias.name`.

use crate::ast::{Expr, SelectQuery, Statement};
use crate::binder::{ScopeTree, SymbolEntry};
use crate::error::{QuarryError, Result};
use crate::visit::{fold_children, fold_select_parts, Folder, QueryPart};

use super::{bound_scope, AliasRemap, Rewriter, Transformed};

const PASS: &str = "transition_tables";

/// Rewrites join column accesses onto the merged transition table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionTables;

impl Rewriter for TransitionTables {
    fn name(&self) -> &'static str {
        PASS
    }

    fn rewrite(&self, statement: &Statement, scopes: &ScopeTree) -> Result<Transformed<Statement>> {
        let mut folder = TransitionFolder {
            scopes,
            remaps: Vec::new(),
            changed: 0,
        };
        let statement = folder.fold_statement(statement)?;
        if !folder.remaps.is_empty() {
            return Err(QuarryError::underflow(PASS, "leave select", 0, folder.remaps.len()));
        }
        Ok(Transformed::from_count(statement, folder.changed))
    }
}

struct TransitionFolder<'a> {
    scopes: &'a ScopeTree,
    /// One entry per SELECT being folded; `None` for single-source selects.
    remaps: Vec<Option<AliasRemap>>,
    changed: usize,
}

impl TransitionFolder<'_> {
    fn remap_for(&self, select: &SelectQuery) -> Result<Option<AliasRemap>> {
        let scope = self.scopes.scope(bound_scope(PASS, select)?)?;
        let (row_alias, symbol) = match (scope.row_alias(), scope.row_symbol()) {
            (Some(alias), Some(symbol)) if symbol.is_merged() => (alias, symbol),
            _ => return Ok(None),
        };
        let remap = scope
            .entries()
            .filter(|(_, entry)| matches!(entry, SymbolEntry::Source { .. }))
            .fold(AliasRemap::new(row_alias, symbol.clone()), |remap, (alias, _)| {
                remap.with_source(alias)
            });
        Ok(Some(remap))
    }
}

impl Folder for TransitionFolder<'_> {
    fn pass_name(&self) -> &'static str {
        PASS
    }

    fn fold_select(&mut self, select: &SelectQuery) -> Result<SelectQuery> {
        let remap = self.remap_for(select)?;
        self.remaps.push(remap);
        let folded = fold_select_parts(self, select)?;
        let remap = self
            .remaps
            .pop()
            .ok_or_else(|| QuarryError::underflow(PASS, "leave select", 1, 0))?;
        if let Some(remap) = remap {
            self.changed += remap.remapped();
        }
        Ok(folded)
    }

    fn fold_expr(&mut self, expr: &Expr, part: QueryPart) -> Result<Expr> {
        if let Some(Some(remap)) = self.remaps.last_mut() {
            return remap.remap(expr, part);
        }
        fold_children(self, expr, part)
    }
}
