//! Iterative flattening of left-deep join chains and right-nested set
//! operator chains.
//!
//! Both chains can be arbitrarily long, so they are walked with explicit
//! work-lists instead of recursion. Every pass that needs source order or
//! operand order goes through these helpers.

use crate::ast::{FromClause, Join, JoinKind, Query, SetOperation, SetOperator, Source};
use crate::error::{QuarryError, Result};

/// Flattened FROM clause: the innermost source followed by each joined operand.
#[derive(Debug)]
pub struct JoinChain<'a> {
    pub first: &'a Source,
    pub steps: Vec<JoinStep<'a>>,
}

/// One joined operand with its condition and the composite alias of the
/// merge it produces.
#[derive(Debug)]
pub struct JoinStep<'a> {
    pub source: &'a Source,
    pub kind: JoinKind,
    pub on: Option<&'a crate::ast::Expr>,
    pub composite_alias: String,
}

impl<'a> JoinChain<'a> {
    /// Returns all sources in source order.
    #[must_use]
    pub fn sources(&self) -> Vec<&'a Source> {
        let mut out = Vec::with_capacity(self.steps.len() + 1);
        out.push(self.first);
        out.extend(self.steps.iter().map(|s| s.source));
        out
    }

    /// Returns the alias rows of this FROM clause are shaped by.
    #[must_use]
    pub fn row_alias(&self) -> &str {
        self.steps
            .last()
            .map_or(self.first.alias.as_str(), |s| s.composite_alias.as_str())
    }

    /// Returns true if the chain joins more than one source.
    #[must_use]
    pub fn is_join(&self) -> bool {
        !self.steps.is_empty()
    }
}

/// Flattens a left-deep join chain into source order.
///
/// Composite aliases concatenate participant aliases in join order:
/// `a, b, c` yields `ab` then `abc`.
#[must_use]
pub fn flatten_joins(from: &FromClause) -> JoinChain<'_> {
    let mut pending: Vec<&Join> = Vec::new();
    let mut current = from;
    let first = loop {
        match current {
            FromClause::Source(source) => break source,
            FromClause::Join(join) => {
                pending.push(join);
                current = &join.left;
            }
        }
    };

    let mut alias = first.alias.clone();
    let mut steps = Vec::with_capacity(pending.len());
    while let Some(join) = pending.pop() {
        alias = composite_alias(&alias, &join.right.alias);
        steps.push(JoinStep {
            source: &join.right,
            kind: join.kind,
            on: join.on.as_ref(),
            composite_alias: alias.clone(),
        });
    }
    JoinChain { first, steps }
}

/// Concatenates two participant aliases.
#[must_use]
pub fn composite_alias(left: &str, right: &str) -> String {
    format!("{left}{right}")
}

/// Rebuilds a left-deep FROM clause from a source list and per-step join data.
///
/// # Errors
///
/// Returns an invariant violation if the source and step counts disagree.
pub fn rebuild_joins(
    pass: &'static str,
    sources: Vec<Source>,
    steps: Vec<(JoinKind, Option<crate::ast::Expr>)>,
) -> Result<FromClause> {
    let expected = steps.len() + 1;
    let available = sources.len();
    let mut sources = sources.into_iter();
    let first = sources
        .next()
        .ok_or_else(|| QuarryError::underflow(pass, "rebuild join chain", expected, available))?;
    let mut from = FromClause::Source(first);
    for (kind, on) in steps {
        let right = sources
            .next()
            .ok_or_else(|| QuarryError::underflow(pass, "rebuild join chain", expected, available))?;
        from = from.join(right, kind, on);
    }
    if sources.next().is_some() {
        return Err(QuarryError::underflow(
            pass,
            "rebuild join chain",
            expected,
            available,
        ));
    }
    Ok(from)
}

/// Flattened set operator chain.
///
/// Evaluation is strictly left to right:
/// `((operands[0] op[0] operands[1]) op[1] operands[2]) ...`.
#[derive(Debug)]
pub struct SetChain<'a> {
    pub operands: Vec<&'a Query>,
    pub operators: Vec<&'a SetOperation>,
}

/// Flattens a set operation whose right operand may itself be a set operation.
#[must_use]
pub fn flatten_set_chain(root: &SetOperation) -> SetChain<'_> {
    let mut operands = vec![&root.left];
    let mut operators = vec![root];
    let mut current = &root.right;
    while let Query::SetOperation(next) = current {
        operands.push(&next.left);
        operators.push(next);
        current = &next.right;
    }
    operands.push(current);
    SetChain {
        operands,
        operators,
    }
}

/// Rebuilds a right-nested set chain from operands and `(operator, keys)` pairs.
///
/// # Errors
///
/// Returns an invariant violation if there is not exactly one more operand
/// than operators.
pub fn rebuild_set_chain(
    pass: &'static str,
    mut operands: Vec<Query>,
    mut operators: Vec<(SetOperator, Vec<String>)>,
) -> Result<Query> {
    let expected = operators.len() + 1;
    let available = operands.len();
    if available != expected {
        return Err(QuarryError::underflow(
            pass,
            "rebuild set chain",
            expected,
            available,
        ));
    }
    let mut tail = operands
        .pop()
        .ok_or_else(|| QuarryError::underflow(pass, "rebuild set chain", expected, 0))?;
    while let Some((op, keys)) = operators.pop() {
        let left = operands.pop().ok_or_else(|| {
            QuarryError::underflow(pass, "rebuild set chain", expected, available)
        })?;
        tail = Query::set_operation(op, keys, left, tail);
    }
    Ok(tail)
}
