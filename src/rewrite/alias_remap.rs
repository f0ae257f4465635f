//! Column alias remapping.

use std::collections::HashSet;
use std::sync::Arc;

use crate::ast::{Expr, ExprKind};
use crate::binder::TableSymbol;
use crate::error::{Result, StructuralError};
use crate::visit::{fold_children, Folder, QueryPart};

/// Moves column accesses from source aliases onto a merged alias.
///
/// `a.x` becomes `target.[a.x]`, addressed by the ordinal of `a.x` in the
/// merged symbol. Member and indexer hops applied to the column are kept,
/// so `a.address.city` becomes `target.[a.address].city`.
#[derive(Debug, Clone)]
pub struct AliasRemap {
    target: String,
    symbol: Arc<TableSymbol>,
    sources: HashSet<String>,
    remapped: usize,
}

impl AliasRemap {
    /// Creates a remapping onto `target`, whose columns are described by `symbol`.
    #[must_use]
    pub fn new(target: impl Into<String>, symbol: Arc<TableSymbol>) -> Self {
        AliasRemap {
            target: target.into(),
            symbol,
            sources: HashSet::new(),
            remapped: 0,
        }
    }

    /// Adds a source alias to move onto the target.
    #[must_use]
    pub fn with_source(mut self, alias: impl Into<String>) -> Self {
        self.sources.insert(alias.into());
        self
    }

    /// Returns the number of column accesses moved so far.
    #[must_use]
    pub fn remapped(&self) -> usize {
        self.remapped
    }

    /// Remaps one expression.
    ///
    /// # Errors
    ///
    /// Returns [`StructuralError::UnresolvedJoinAlias`] if a column of a
    /// source alias has no counterpart in the target symbol.
    pub fn remap(&mut self, expr: &Expr, part: QueryPart) -> Result<Expr> {
        self.fold_expr(expr, part)
    }
}

impl Folder for AliasRemap {
    fn pass_name(&self) -> &'static str {
        "alias_remap"
    }

    fn fold_expr(&mut self, expr: &Expr, part: QueryPart) -> Result<Expr> {
        match &expr.kind {
            ExprKind::Column { alias, name, .. } if self.sources.contains(alias) => {
                let qualified = format!("{alias}.{name}");
                let column = self.symbol.column(&qualified).ok_or_else(|| {
                    StructuralError::UnresolvedJoinAlias {
                        alias: alias.clone(),
                        row_alias: self.target.clone(),
                    }
                })?;
                self.remapped += 1;
                Ok(Expr {
                    kind: ExprKind::Column {
                        alias: self.target.clone(),
                        name: qualified,
                        ordinal: Some(column.ordinal),
                    },
                    ty: expr.ty.clone(),
                })
            }
            _ => fold_children(self, expr, part),
        }
    }
}
