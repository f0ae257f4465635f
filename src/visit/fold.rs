//! Clone-and-reconstruct traversal.
//!
//! A `Folder` produces a new tree from a borrowed one. The default methods
//! rebuild every node unchanged, in the same order the read-only walker
//! uses; a pass overrides only the hooks it cares about and calls back into
//! the defaults for everything else.

use crate::ast::{
    AggregateCall, CteDef, Expr, ExprKind, Field, GroupByClause, OrderItem, Query, SelectQuery,
    Source, SourceKind, Statement,
};
use crate::error::Result;

use super::{flatten_joins, flatten_set_chain, rebuild_joins, rebuild_set_chain, QueryPart};

/// Clone-and-reconstruct tree transformer.
pub trait Folder {
    /// Pass name used in invariant-violation diagnostics.
    fn pass_name(&self) -> &'static str;

    fn fold_statement(&mut self, statement: &Statement) -> Result<Statement> {
        match statement {
            Statement::Query(query) => Ok(Statement::Query(self.fold_query(query)?)),
            Statement::With { ctes, body } => {
                let mut folded = Vec::with_capacity(ctes.len());
                for cte in ctes {
                    folded.push(CteDef::new(cte.name.clone(), self.fold_query(&cte.query)?));
                }
                Ok(Statement::With {
                    ctes: folded,
                    body: self.fold_query(body)?,
                })
            }
        }
    }

    fn fold_query(&mut self, query: &Query) -> Result<Query> {
        match query {
            Query::Select(select) => Ok(Query::select(self.fold_select(select)?)),
            Query::SetOperation(set) => {
                let chain = flatten_set_chain(set);
                let mut operands = Vec::with_capacity(chain.operands.len());
                for operand in chain.operands {
                    operands.push(self.fold_query(operand)?);
                }
                let operators = chain
                    .operators
                    .iter()
                    .map(|o| (o.op, o.keys.clone()))
                    .collect();
                rebuild_set_chain(self.pass_name(), operands, operators)
            }
        }
    }

    fn fold_select(&mut self, select: &SelectQuery) -> Result<SelectQuery> {
        fold_select_parts(self, select)
    }

    fn fold_source(&mut self, source: &Source) -> Result<Source> {
        let kind = match &source.kind {
            SourceKind::Schema {
                schema,
                method,
                args,
            } => SourceKind::Schema {
                schema: schema.clone(),
                method: method.clone(),
                args: args
                    .iter()
                    .map(|a| self.fold_expr(a, QueryPart::From))
                    .collect::<Result<_>>()?,
            },
            SourceKind::Reference { name } => SourceKind::Reference { name: name.clone() },
            SourceKind::Subquery(query) => SourceKind::Subquery(Box::new(self.fold_query(query)?)),
        };
        Ok(Source {
            alias: source.alias.clone(),
            kind,
        })
    }

    fn fold_expr(&mut self, expr: &Expr, part: QueryPart) -> Result<Expr> {
        fold_children(self, expr, part)
    }
}

/// Rebuilds every clause of a SELECT through the folder's hooks.
///
/// # Errors
///
/// Propagates any error raised by a hook.
pub fn fold_select_parts<F: Folder + ?Sized>(
    folder: &mut F,
    select: &SelectQuery,
) -> Result<SelectQuery> {
    let chain = flatten_joins(&select.from);
    let mut sources = Vec::with_capacity(chain.steps.len() + 1);
    let mut steps = Vec::with_capacity(chain.steps.len());
    sources.push(folder.fold_source(chain.first)?);
    for step in &chain.steps {
        sources.push(folder.fold_source(step.source)?);
        let on = step
            .on
            .map(|e| folder.fold_expr(e, QueryPart::Join))
            .transpose()?;
        steps.push((step.kind, on));
    }
    let from = rebuild_joins(folder.pass_name(), sources, steps)?;

    let where_clause = select
        .where_clause
        .as_ref()
        .map(|e| folder.fold_expr(e, QueryPart::Where))
        .transpose()?;

    let group_by = match &select.group_by {
        Some(group_by) => {
            let keys = group_by
                .keys
                .iter()
                .map(|k| folder.fold_expr(k, QueryPart::GroupBy))
                .collect::<Result<Vec<_>>>()?;
            let mut aggregates = Vec::with_capacity(group_by.aggregates.len());
            for aggregate in &group_by.aggregates {
                aggregates.push(AggregateCall {
                    arg: aggregate
                        .arg
                        .as_ref()
                        .map(|a| folder.fold_expr(a, QueryPart::GroupBy))
                        .transpose()?,
                    ..aggregate.clone()
                });
            }
            let having = group_by
                .having
                .as_ref()
                .map(|h| folder.fold_expr(h, QueryPart::Having))
                .transpose()?;
            Some(GroupByClause {
                keys,
                having,
                aggregates,
            })
        }
        None => None,
    };

    let mut fields = Vec::with_capacity(select.fields.len());
    for field in &select.fields {
        fields.push(Field {
            expr: folder.fold_expr(&field.expr, QueryPart::Select)?,
            alias: field.alias.clone(),
        });
    }

    let mut order_by = Vec::with_capacity(select.order_by.len());
    for item in &select.order_by {
        order_by.push(OrderItem {
            expr: folder.fold_expr(&item.expr, QueryPart::OrderBy)?,
            ascending: item.ascending,
        });
    }

    Ok(SelectQuery {
        fields,
        distinct: select.distinct,
        from,
        where_clause,
        group_by,
        order_by,
        skip: select.skip,
        take: select.take,
        scope: select.scope,
    })
}

/// Rebuilds an expression node after folding each of its children.
///
/// # Errors
///
/// Propagates any error raised by the folder.
pub fn fold_children<F: Folder + ?Sized>(
    folder: &mut F,
    expr: &Expr,
    part: QueryPart,
) -> Result<Expr> {
    let mut fold = |e: &Expr| folder.fold_expr(e, part).map(Box::new);
    let kind = match &expr.kind {
        ExprKind::Literal(_)
        | ExprKind::Null
        | ExprKind::Identifier(_)
        | ExprKind::Column { .. }
        | ExprKind::Star
        | ExprKind::GroupRef { .. } => expr.kind.clone(),
        ExprKind::Member { target, member } => ExprKind::Member {
            target: fold(target)?,
            member: member.clone(),
        },
        ExprKind::Index { target, index } => ExprKind::Index {
            target: fold(target)?,
            index: fold(index)?,
        },
        ExprKind::Binary { op, left, right } => ExprKind::Binary {
            op: *op,
            left: fold(left)?,
            right: fold(right)?,
        },
        ExprKind::Unary { op, operand } => ExprKind::Unary {
            op: *op,
            operand: fold(operand)?,
        },
        ExprKind::Call {
            name,
            args,
            distinct,
        } => ExprKind::Call {
            name: name.clone(),
            args: args
                .iter()
                .map(|a| fold(a).map(|b| *b))
                .collect::<Result<_>>()?,
            distinct: *distinct,
        },
        ExprKind::Case { whens, otherwise } => {
            let mut folded = Vec::with_capacity(whens.len());
            for (condition, result) in whens {
                folded.push((*fold(condition)?, *fold(result)?));
            }
            ExprKind::Case {
                whens: folded,
                otherwise: otherwise.as_deref().map(&mut fold).transpose()?,
            }
        }
        ExprKind::InList {
            expr: inner,
            list,
            negated,
        } => ExprKind::InList {
            expr: fold(inner)?,
            list: list
                .iter()
                .map(|e| fold(e).map(|b| *b))
                .collect::<Result<_>>()?,
            negated: *negated,
        },
        ExprKind::Between {
            expr: inner,
            low,
            high,
            negated,
        } => ExprKind::Between {
            expr: fold(inner)?,
            low: fold(low)?,
            high: fold(high)?,
            negated: *negated,
        },
        ExprKind::IsNull { operand, negated } => ExprKind::IsNull {
            operand: fold(operand)?,
            negated: *negated,
        },
    };
    Ok(Expr {
        kind,
        ty: expr.ty.clone(),
    })
}
