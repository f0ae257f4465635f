//! Aggregate and grouped-field rewriting.
//!
//! A grouped SELECT is evaluated in two phases: source rows are bucketed by
//! the GROUP BY keys while aggregate state accumulates, then HAVING, the
//! selected fields and ORDER BY run once per bucket over the group-result
//! row `keys ++ aggregates`. This pass rewrites the group-phase clauses into
//! ordinal accesses into that row.

use indexmap::IndexMap;

use crate::ast::{AggregateCall, Expr, ExprKind, GroupByClause, NodeKey, SelectQuery, Statement};
use crate::binder::ScopeTree;
use crate::error::{QuarryError, Result, StructuralError};
use crate::functions::AggregateFunction;
use crate::visit::{fold_children, fold_select_parts, Folder, QueryPart};

use super::{needs_grouping, Rewriter, Transformed};

const PASS: &str = "aggregate_rewrite";

/// Rewrites aggregates and grouped expressions into group-row accesses.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateRewrite;

impl Rewriter for AggregateRewrite {
    fn name(&self) -> &'static str {
        PASS
    }

    fn rewrite(&self, statement: &Statement, _scopes: &ScopeTree) -> Result<Transformed<Statement>> {
        let mut folder = AggregateFolder {
            groups: Vec::new(),
            changed: 0,
        };
        let statement = folder.fold_statement(statement)?;
        Ok(Transformed::from_count(statement, folder.changed))
    }
}

/// Group-row layout of the SELECT being folded.
struct GroupLayout {
    keys: IndexMap<NodeKey, ()>,
    aggregates: IndexMap<NodeKey, AggregateCall>,
}

impl GroupLayout {
    fn new(keys: &[Expr]) -> Self {
        GroupLayout {
            keys: keys.iter().map(|k| (k.key(), ())).collect(),
            aggregates: IndexMap::new(),
        }
    }
}

struct AggregateFolder {
    groups: Vec<Option<GroupLayout>>,
    changed: usize,
}

impl AggregateFolder {
    /// Rewrites one group-phase expression, outermost match first.
    fn rewrite_grouped(&mut self, expr: &Expr, part: QueryPart) -> Result<Expr> {
        let layout = match self.groups.last_mut() {
            Some(Some(layout)) => layout,
            _ => return Err(QuarryError::underflow(PASS, "rewrite grouped expression", 1, 0)),
        };
        let key = expr.key();
        let ty = expr.data_type();

        if let Some(ordinal) = layout.keys.get_index_of(&key) {
            self.changed += 1;
            return Ok(Expr::group_ref(ordinal, key.as_str()).typed(ty));
        }

        match &expr.kind {
            ExprKind::Call {
                name,
                args,
                distinct,
            } if AggregateFunction::parse(name).is_some() => {
                let offset = layout.keys.len();
                let entry = layout.aggregates.entry(key.clone());
                let ordinal = offset + entry.index();
                entry.or_insert_with(|| AggregateCall {
                    function: name.to_uppercase(),
                    arg: args
                        .first()
                        .filter(|a| !matches!(a.kind, ExprKind::Star))
                        .cloned(),
                    distinct: *distinct,
                    data_type: ty.clone(),
                });
                self.changed += 1;
                Ok(Expr::group_ref(ordinal, key.as_str()).typed(ty))
            }
            ExprKind::Column { .. } => {
                Err(StructuralError::UngroupedColumn(expr.to_string()).into())
            }
            _ => fold_children(self, expr, part),
        }
    }
}

impl Folder for AggregateFolder {
    fn pass_name(&self) -> &'static str {
        PASS
    }

    fn fold_select(&mut self, select: &SelectQuery) -> Result<SelectQuery> {
        let layout = needs_grouping(select).then(|| {
            GroupLayout::new(
                select
                    .group_by
                    .as_ref()
                    .map(|g| g.keys.as_slice())
                    .unwrap_or_default(),
            )
        });
        self.groups.push(layout);
        let mut folded = fold_select_parts(self, select)?;
        let layout = self
            .groups
            .pop()
            .ok_or_else(|| QuarryError::underflow(PASS, "leave select", 1, 0))?;

        if let Some(layout) = layout {
            let (keys, having) = match folded.group_by.take() {
                Some(g) => (g.keys, g.having),
                None => (Vec::new(), None),
            };
            folded.group_by = Some(GroupByClause {
                keys,
                having,
                aggregates: layout.aggregates.into_values().collect(),
            });
        }
        Ok(folded)
    }

    fn fold_expr(&mut self, expr: &Expr, part: QueryPart) -> Result<Expr> {
        let grouped = matches!(self.groups.last(), Some(Some(_)));
        match part {
            QueryPart::Having | QueryPart::Select | QueryPart::OrderBy if grouped => {
                self.rewrite_grouped(expr, part)
            }
            _ => fold_children(self, expr, part),
        }
    }
}
