//! Traversal infrastructure shared by every compilation pass.
//!
//! All passes walk a SELECT in one fixed order:
//!
//! 1. sources in source order, each join's ON condition right after its operand
//! 2. WHERE
//! 3. GROUP BY keys, then extracted aggregate arguments
//! 4. HAVING
//! 5. selected fields
//! 6. ORDER BY
//!
//! Expressions are visited post-order, so the root of a member-access chain
//! is always seen before the hops applied to it. Common table expressions are
//! visited in declaration order before the body; set operands left to right.

mod chain;
mod fold;

pub use chain::{
    composite_alias, flatten_joins, flatten_set_chain, rebuild_joins, rebuild_set_chain,
    JoinChain, JoinStep, SetChain,
};
pub use fold::{fold_children, fold_select_parts, Folder};

use crate::ast::{Expr, ExprKind, Query, SelectQuery, Source, SourceKind, Statement};
use crate::error::Result;

/// Clause an expression belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryPart {
    None,
    From,
    Join,
    Where,
    GroupBy,
    Having,
    Select,
    OrderBy,
}

impl QueryPart {
    /// Returns the SQL clause name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryPart::None => "",
            QueryPart::From => "FROM",
            QueryPart::Join => "ON",
            QueryPart::Where => "WHERE",
            QueryPart::GroupBy => "GROUP BY",
            QueryPart::Having => "HAVING",
            QueryPart::Select => "SELECT",
            QueryPart::OrderBy => "ORDER BY",
        }
    }
}

/// Read-only traversal callbacks.
///
/// `conditional` is true for expressions that only run on some rows of their
/// clause: CASE branches after the first WHEN condition, and the right-hand
/// side of `AND`/`OR`.
pub trait Visitor {
    fn enter_select(&mut self, _select: &SelectQuery) -> Result<()> {
        Ok(())
    }

    fn leave_select(&mut self, _select: &SelectQuery) -> Result<()> {
        Ok(())
    }

    fn visit_source(&mut self, _source: &Source) -> Result<()> {
        Ok(())
    }

    fn visit_expr(&mut self, _expr: &Expr, _part: QueryPart, _conditional: bool) -> Result<()> {
        Ok(())
    }
}

/// Walks a statement: CTEs in declaration order, then the body.
pub fn walk_statement<V: Visitor + ?Sized>(visitor: &mut V, statement: &Statement) -> Result<()> {
    if let Statement::With { ctes, .. } = statement {
        for cte in ctes {
            walk_query(visitor, &cte.query)?;
        }
    }
    walk_query(visitor, statement.body())
}

/// Walks a query; set operand chains are flattened and visited left to right.
pub fn walk_query<V: Visitor + ?Sized>(visitor: &mut V, query: &Query) -> Result<()> {
    match query {
        Query::Select(select) => walk_select(visitor, select),
        Query::SetOperation(set) => {
            for operand in flatten_set_chain(set).operands {
                walk_query(visitor, operand)?;
            }
            Ok(())
        }
    }
}

/// Walks a SELECT in the fixed clause order.
pub fn walk_select<V: Visitor + ?Sized>(visitor: &mut V, select: &SelectQuery) -> Result<()> {
    visitor.enter_select(select)?;

    let chain = flatten_joins(&select.from);
    walk_source(visitor, chain.first)?;
    for step in &chain.steps {
        walk_source(visitor, step.source)?;
        if let Some(on) = step.on {
            walk_expr(visitor, on, QueryPart::Join, false)?;
        }
    }
    if let Some(predicate) = &select.where_clause {
        walk_expr(visitor, predicate, QueryPart::Where, false)?;
    }
    if let Some(group_by) = &select.group_by {
        for key in &group_by.keys {
            walk_expr(visitor, key, QueryPart::GroupBy, false)?;
        }
        for aggregate in &group_by.aggregates {
            if let Some(arg) = &aggregate.arg {
                walk_expr(visitor, arg, QueryPart::GroupBy, false)?;
            }
        }
        if let Some(having) = &group_by.having {
            walk_expr(visitor, having, QueryPart::Having, false)?;
        }
    }
    for field in &select.fields {
        walk_expr(visitor, &field.expr, QueryPart::Select, false)?;
    }
    for item in &select.order_by {
        walk_expr(visitor, &item.expr, QueryPart::OrderBy, false)?;
    }

    visitor.leave_select(select)
}

fn walk_source<V: Visitor + ?Sized>(visitor: &mut V, source: &Source) -> Result<()> {
    visitor.visit_source(source)?;
    match &source.kind {
        SourceKind::Schema { args, .. } => {
            for arg in args {
                walk_expr(visitor, arg, QueryPart::From, false)?;
            }
            Ok(())
        }
        SourceKind::Reference { .. } => Ok(()),
        SourceKind::Subquery(query) => walk_query(visitor, query),
    }
}

/// Walks an expression post-order.
pub fn walk_expr<V: Visitor + ?Sized>(
    visitor: &mut V,
    expr: &Expr,
    part: QueryPart,
    conditional: bool,
) -> Result<()> {
    match &expr.kind {
        ExprKind::Binary { op, left, right } if op.is_logical() => {
            walk_expr(visitor, left, part, conditional)?;
            walk_expr(visitor, right, part, true)?;
        }
        ExprKind::Case { whens, otherwise } => {
            for (i, (condition, result)) in whens.iter().enumerate() {
                walk_expr(visitor, condition, part, conditional || i > 0)?;
                walk_expr(visitor, result, part, true)?;
            }
            if let Some(e) = otherwise {
                walk_expr(visitor, e, part, true)?;
            }
        }
        ExprKind::Member { .. } | ExprKind::Index { .. } => {
            walk_access_chain(visitor, expr, part, conditional)?;
            return Ok(());
        }
        _ => {
            for child in expr.children() {
                walk_expr(visitor, child, part, conditional)?;
            }
        }
    }
    visitor.visit_expr(expr, part, conditional)
}

/// Member/indexer chains are unrolled iteratively: root first, then each hop
/// outward.
fn walk_access_chain<V: Visitor + ?Sized>(
    visitor: &mut V,
    expr: &Expr,
    part: QueryPart,
    conditional: bool,
) -> Result<()> {
    let mut hops = Vec::new();
    let mut current = expr;
    loop {
        match &current.kind {
            ExprKind::Member { target, .. } | ExprKind::Index { target, .. } => {
                hops.push(current);
                current = target;
            }
            _ => break,
        }
    }
    walk_expr(visitor, current, part, conditional)?;
    while let Some(hop) = hops.pop() {
        if let ExprKind::Index { index, .. } = &hop.kind {
            walk_expr(visitor, index, part, conditional)?;
        }
        visitor.visit_expr(hop, part, conditional)?;
    }
    Ok(())
}
