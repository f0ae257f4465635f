//! Common-subexpression analysis.
//!
//! One forward pass over the rewritten statement counts the occurrences of
//! every expression per SELECT and phase, and assigns a cache slot to each
//! expression that is computed more than once per row, is safe to compute
//! eagerly and is cheaper to look up than to recompute.
//!
//! Contexts:
//! - WHERE and SELECT fields are safe.
//! - Join conditions, GROUP BY keys, aggregate arguments, HAVING and ORDER BY
//!   run in a different execution scope; any occurrence there makes the
//!   expression non-cacheable.
//! - CASE branches and the right operand of AND/OR run only on some rows. An
//!   expression first seen there is non-cacheable; one already seen in a safe
//!   context keeps its slot.
//!
//! Grouped queries are analyzed as two phases with separate numbering: the
//! source-row phase (joins, WHERE, GROUP BY) and the group-row phase
//! (HAVING, fields, ORDER BY).

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::ast::{Expr, ExprKind, NodeKey, SelectQuery, Statement};
use crate::binder::ScopeId;
use crate::error::{QuarryError, Result};
use crate::functions::FunctionRegistry;
use crate::visit::{walk_statement, QueryPart, Visitor};

const PASS: &str = "cse";

/// Evaluation phase of a SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    /// Once per (joined) source row.
    Row,
    /// Once per group-result row.
    Group,
}

impl Phase {
    /// Returns the phase an expression in `part` is evaluated in.
    #[must_use]
    pub fn of(part: QueryPart, grouped: bool) -> Phase {
        match part {
            QueryPart::Having | QueryPart::Select | QueryPart::OrderBy if grouped => Phase::Group,
            _ => Phase::Row,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Row => f.write_str("row"),
            Phase::Group => f.write_str("group"),
        }
    }
}

/// Cache slot assignment for a whole statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSlots {
    slots: IndexMap<(ScopeId, Phase), IndexMap<NodeKey, usize>>,
}

impl CacheSlots {
    /// Creates an empty assignment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot of an expression, if it has one.
    #[must_use]
    pub fn slot(&self, scope: ScopeId, phase: Phase, key: &NodeKey) -> Option<usize> {
        self.slots.get(&(scope, phase)).and_then(|m| m.get(key).copied())
    }

    /// Returns the number of slots in one scope phase.
    #[must_use]
    pub fn slot_count(&self, scope: ScopeId, phase: Phase) -> usize {
        self.slots.get(&(scope, phase)).map_or(0, IndexMap::len)
    }

    /// Returns the number of slots across the statement.
    #[must_use]
    pub fn total(&self) -> usize {
        self.slots.values().map(IndexMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Iterates over `(scope, phase, key, slot)` in assignment order.
    pub fn iter(&self) -> impl Iterator<Item = (ScopeId, Phase, &NodeKey, usize)> {
        self.slots.iter().flat_map(|((scope, phase), keys)| {
            keys.iter().map(move |(key, slot)| (*scope, *phase, key, *slot))
        })
    }

    fn insert(&mut self, scope: ScopeId, phase: Phase, keys: IndexMap<NodeKey, usize>) {
        if !keys.is_empty() {
            self.slots.insert((scope, phase), keys);
        }
    }
}

/// Occurrence bookkeeping for one phase of one SELECT.
#[derive(Debug, Default)]
struct PhaseState {
    /// Count and first-seen node, in first-seen order.
    seen: IndexMap<NodeKey, (usize, Expr)>,
    non_cacheable: HashSet<NodeKey>,
    safe: HashSet<NodeKey>,
}

impl PhaseState {
    fn assign(self) -> IndexMap<NodeKey, usize> {
        let mut slots = IndexMap::new();
        for (key, (count, node)) in self.seen {
            if count > 1 && !self.non_cacheable.contains(&key) && worth_caching(&node) {
                let slot = slots.len();
                slots.insert(key, slot);
            }
        }
        slots
    }
}

#[derive(Debug)]
struct SelectState {
    scope: ScopeId,
    grouped: bool,
    row: PhaseState,
    group: PhaseState,
}

/// Returns true if a cached lookup beats recomputing the node.
fn worth_caching(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Literal(_)
        | ExprKind::Null
        | ExprKind::Identifier(_)
        | ExprKind::Member { .. }
        | ExprKind::Index { .. }
        | ExprKind::Star => false,
        ExprKind::Column { .. } | ExprKind::GroupRef { .. } => {
            expr.data_type().is_value_or_string()
        }
        _ => true,
    }
}

/// Computes cache slots for a rewritten statement.
pub struct CseAnalyzer<'a> {
    functions: &'a FunctionRegistry,
    stack: Vec<SelectState>,
    slots: CacheSlots,
}

impl<'a> CseAnalyzer<'a> {
    #[must_use]
    pub fn new(functions: &'a FunctionRegistry) -> Self {
        CseAnalyzer {
            functions,
            stack: Vec::new(),
            slots: CacheSlots::new(),
        }
    }

    /// Analyzes a statement.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation if a SELECT carries no scope or the
    /// select stack underflows.
    #[instrument(level = "trace", skip_all, name = "cse")]
    pub fn analyze(mut self, statement: &Statement) -> Result<CacheSlots> {
        walk_statement(&mut self, statement)?;
        if !self.stack.is_empty() {
            return Err(QuarryError::underflow(PASS, "leave select", 0, self.stack.len()));
        }
        debug!(slots = self.slots.total(), "assigned cache slots");
        Ok(self.slots)
    }

    /// Returns true if the expression calls a non-deterministic function anywhere.
    fn is_volatile(&self, expr: &Expr) -> bool {
        let mut stack = vec![expr];
        while let Some(e) = stack.pop() {
            if let ExprKind::Call { name, .. } = &e.kind {
                if self.functions.is_non_deterministic(name) {
                    return true;
                }
            }
            stack.extend(e.children());
        }
        false
    }
}

impl Visitor for CseAnalyzer<'_> {
    fn enter_select(&mut self, select: &SelectQuery) -> Result<()> {
        let scope = select
            .scope
            .ok_or_else(|| QuarryError::underflow(PASS, "resolve select scope", 1, 0))?;
        self.stack.push(SelectState {
            scope,
            grouped: select.is_grouped(),
            row: PhaseState::default(),
            group: PhaseState::default(),
        });
        Ok(())
    }

    fn leave_select(&mut self, _select: &SelectQuery) -> Result<()> {
        let state = self
            .stack
            .pop()
            .ok_or_else(|| QuarryError::underflow(PASS, "leave select", 1, 0))?;
        self.slots.insert(state.scope, Phase::Row, state.row.assign());
        self.slots.insert(state.scope, Phase::Group, state.group.assign());
        Ok(())
    }

    fn visit_expr(&mut self, expr: &Expr, part: QueryPart, conditional: bool) -> Result<()> {
        let volatile = self.is_volatile(expr);
        let state = self
            .stack
            .last_mut()
            .ok_or_else(|| QuarryError::underflow(PASS, "visit expression", 1, 0))?;
        let phase = match Phase::of(part, state.grouped) {
            Phase::Row => &mut state.row,
            Phase::Group => &mut state.group,
        };

        let key = expr.key();
        phase
            .seen
            .entry(key.clone())
            .and_modify(|(count, _)| *count += 1)
            .or_insert_with(|| (1, expr.clone()));

        let separate = !matches!(part, QueryPart::Where | QueryPart::Select);
        if volatile || separate {
            phase.non_cacheable.insert(key);
        } else if conditional {
            if !phase.safe.contains(&key) {
                phase.non_cacheable.insert(key);
            }
        } else {
            phase.safe.insert(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Field, FromClause, OrderItem, Query, Source};
    use crate::types::DataType;

    const SCOPE: ScopeId = ScopeId::ROOT;

    fn len_plus_one() -> Expr {
        Expr::add(
            Expr::call("LEN", vec![Expr::column("t", "name").typed(DataType::String)])
                .typed(DataType::Int64),
            Expr::int(1).typed(DataType::Int64),
        )
        .typed(DataType::Int64)
    }

    fn select(fields: Vec<Expr>) -> SelectQuery {
        let mut select = SelectQuery::new(
            fields.into_iter().map(Field::new).collect(),
            FromClause::source(Source::schema("s", "t", vec![], "t")),
        );
        select.scope = Some(SCOPE);
        select
    }

    fn analyze(select: SelectQuery) -> CacheSlots {
        CseAnalyzer::new(FunctionRegistry::builtin())
            .analyze(&Statement::Query(Query::select(select)))
            .unwrap()
    }

    fn gt(expr: Expr) -> Expr {
        Expr::binary(expr, BinaryOp::Gt, Expr::int(3)).typed(DataType::Bool)
    }

    #[test]
    fn test_where_and_select_share_slot() {
        let slots = analyze(select(vec![len_plus_one()]).with_where(gt(len_plus_one())));
        // Post-order: the string column, then LEN(t.name), then the sum.
        let column = Expr::column("t", "name").key();
        let inner = Expr::call("LEN", vec![Expr::column("t", "name")]).key();
        assert_eq!(slots.slot(SCOPE, Phase::Row, &column), Some(0));
        assert_eq!(slots.slot(SCOPE, Phase::Row, &inner), Some(1));
        assert_eq!(slots.slot(SCOPE, Phase::Row, &len_plus_one().key()), Some(2));
        assert_eq!(slots.total(), 3);
    }

    #[test]
    fn test_single_occurrence_gets_no_slot() {
        let slots = analyze(select(vec![len_plus_one()]));
        assert!(slots.is_empty());
    }

    #[test]
    fn test_separate_scope_occurrences_never_cached() {
        let mut query = select(vec![Expr::int(1)]);
        for _ in 0..5 {
            query = query.with_order_by(OrderItem::asc(len_plus_one()));
        }
        assert!(analyze(query).is_empty());
    }

    #[test]
    fn test_order_by_poisons_prior_safe_sightings() {
        let query = select(vec![len_plus_one(), len_plus_one()])
            .with_order_by(OrderItem::asc(len_plus_one()));
        let slots = analyze(query);
        assert_eq!(slots.slot(SCOPE, Phase::Row, &len_plus_one().key()), None);
    }

    #[test]
    fn test_non_deterministic_never_cached() {
        let now = || Expr::call("NOW", vec![]).typed(DataType::Timestamp);
        let year = || Expr::call("YEAR", vec![now()]).typed(DataType::Int64);
        let slots = analyze(select(vec![year(), year(), now(), now()]));
        assert!(slots.is_empty());
    }

    #[test]
    fn test_conditional_first_sighting_is_not_cached() {
        let case = Expr::case(
            vec![(Expr::column("t", "flag").typed(DataType::Bool), len_plus_one())],
            None,
        )
        .typed(DataType::Int64);
        let slots = analyze(select(vec![case, len_plus_one()]));
        assert_eq!(slots.slot(SCOPE, Phase::Row, &len_plus_one().key()), None);
    }

    #[test]
    fn test_conditional_after_safe_sighting_reuses_slot() {
        let case = Expr::case(
            vec![(Expr::column("t", "flag").typed(DataType::Bool), len_plus_one())],
            None,
        )
        .typed(DataType::Int64);
        let slots = analyze(select(vec![len_plus_one(), case]));
        assert!(slots.slot(SCOPE, Phase::Row, &len_plus_one().key()).is_some());
    }

    #[test]
    fn test_cheap_nodes_not_worth_caching() {
        let member = || Expr::member(Expr::column("t", "addr"), "city").typed(DataType::String);
        let record_col = || {
            Expr::column("t", "addr").typed(DataType::record(crate::types::RecordType::new(
                "Address",
                vec![("city".into(), DataType::String)],
            )))
        };
        let slots = analyze(select(vec![
            Expr::int(7).typed(DataType::Int64),
            Expr::int(7).typed(DataType::Int64),
            member(),
            member(),
            record_col(),
            record_col(),
        ]));
        assert!(slots.is_empty());
        let string_col = || Expr::column("t", "name").typed(DataType::String);
        let slots = analyze(select(vec![string_col(), string_col()]));
        assert_eq!(slots.total(), 1);
    }

    #[test]
    fn test_grouped_phases_numbered_independently() {
        let mut query = select(vec![
            Expr::group_ref(0, "k").typed(DataType::String),
            Expr::group_ref(0, "k").typed(DataType::String),
        ])
        .with_where(Expr::and(gt(len_plus_one()), gt(len_plus_one())).typed(DataType::Bool))
        .with_group_by(vec![Expr::column("t", "k").typed(DataType::String)]);
        query.scope = Some(SCOPE);
        let slots = analyze(query);
        assert_eq!(slots.slot_count(SCOPE, Phase::Group), 1);
        assert_eq!(
            slots.slot(SCOPE, Phase::Group, &Expr::group_ref(0, "k").key()),
            Some(0)
        );
        assert!(slots.slot_count(SCOPE, Phase::Row) >= 1);
    }
}
