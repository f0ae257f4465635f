//! Reference runtime for executable plans.
//!
//! Each SELECT becomes a pull-based pipeline of physical operators:
//! scan and nested-loop joins, filter, grouping, projection, then
//! DISTINCT, ORDER BY and skip/take. Set chains and CTEs are evaluated
//! eagerly into row vectors.

mod aggregate;
mod eval;
mod filter;
mod join;
mod project;
mod scan;
mod set_ops;
mod sort;

use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::codegen::{ExecutablePlan, PlanNode, SelectPlan, SourcePlan};
use crate::error::{QuarryError, Result};
use crate::types::{QueryResult, Row, Value};

pub use aggregate::AggregateOperator;
pub use eval::{evaluate, is_true};
pub use filter::FilterOperator;
pub use join::NestedLoopJoinOperator;
pub use project::ProjectOperator;
pub use scan::ScanOperator;
pub use set_ops::combine;
pub use sort::{DistinctOperator, LimitOperator, SortOperator};

/// A row in flight between operators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub values: Vec<Value>,
    /// Cache slots of the current phase, filled lazily.
    pub cache: Vec<Option<Value>>,
    /// ORDER BY keys, set by projection.
    pub sort_keys: Vec<Value>,
}

impl Frame {
    /// Creates a frame without cache slots.
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Frame {
            values,
            ..Frame::default()
        }
    }

    /// Creates a frame with `slots` empty cache slots.
    #[must_use]
    pub fn with_cache(values: Vec<Value>, slots: usize) -> Self {
        Frame {
            values,
            cache: vec![None; slots],
            sort_keys: Vec::new(),
        }
    }
}

/// Trait for physical operators in the execution pipeline.
pub trait PhysicalOperator {
    /// Returns the next frame, or None if exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if evaluation of an expression fails.
    fn next(&mut self) -> Result<Option<Frame>>;
}

/// Gives every source row a fresh set of row-phase cache slots.
struct RowCacheOperator {
    child: Box<dyn PhysicalOperator>,
    slots: usize,
}

impl PhysicalOperator for RowCacheOperator {
    fn next(&mut self) -> Result<Option<Frame>> {
        Ok(self
            .child
            .next()?
            .map(|frame| Frame::with_cache(frame.values, self.slots)))
    }
}

/// Executes a plan to completion.
///
/// # Errors
///
/// Returns an error if a schema cannot produce its rows or an expression
/// fails to evaluate.
#[instrument(level = "trace", skip_all, name = "execute")]
pub fn execute(plan: &ExecutablePlan) -> Result<QueryResult> {
    let mut executor = Executor::default();
    for (name, node) in &plan.ctes {
        let rows = executor.evaluate(node)?;
        debug!(cte = %name, rows = rows.len(), "materialized cte");
        executor.ctes.insert(name.clone(), rows);
    }
    let rows = executor.evaluate(&plan.root)?;

    let mut result = QueryResult::new(plan.column_names());
    for row in rows {
        result.add_row(Row::new(row));
    }
    debug!(rows = result.row_count(), "executed plan");
    Ok(result)
}

#[derive(Default)]
struct Executor {
    ctes: HashMap<String, Vec<Vec<Value>>>,
}

impl Executor {
    fn evaluate(&self, node: &PlanNode) -> Result<Vec<Vec<Value>>> {
        match node {
            PlanNode::Select(select) => self.select(select),
            PlanNode::SetChain { first, steps } => {
                let mut rows = self.evaluate(first)?;
                for step in steps {
                    let right = self.evaluate(&step.operand)?;
                    rows = combine(step.op, rows, right, step.key_positions.as_deref());
                }
                Ok(rows)
            }
        }
    }

    fn source(&self, source: &SourcePlan) -> Result<ScanOperator> {
        let (alias, rows) = match source {
            SourcePlan::Table {
                schema,
                method,
                args,
                alias,
                ..
            } => (alias, schema.rows(method, args)?),
            SourcePlan::Cte { name, alias, .. } => {
                let rows = self.ctes.get(name).cloned().ok_or_else(|| {
                    QuarryError::ExecutionError(format!("CTE '{name}' was not materialized"))
                })?;
                (alias, rows)
            }
            SourcePlan::Subquery { plan, alias, .. } => (alias, self.evaluate(plan)?),
        };
        Ok(ScanOperator::new(alias.clone(), source.width(), rows))
    }

    fn select(&self, plan: &SelectPlan) -> Result<Vec<Vec<Value>>> {
        let mut sources = plan.sources.iter();
        let first = sources
            .next()
            .ok_or_else(|| QuarryError::ExecutionError("SELECT without a source".into()))?;
        if plan.joins.len() + 1 != plan.sources.len() {
            return Err(QuarryError::ExecutionError(format!(
                "SELECT has {} source(s) but {} join(s)",
                plan.sources.len(),
                plan.joins.len()
            )));
        }

        let mut width = first.width();
        let mut op: Box<dyn PhysicalOperator> = Box::new(self.source(first)?);
        for (source, join) in sources.zip(&plan.joins) {
            let mut right = self.source(source)?;
            let mut rows = Vec::new();
            while let Some(frame) = right.next()? {
                rows.push(frame.values);
            }
            op = Box::new(NestedLoopJoinOperator::new(
                op,
                width,
                rows,
                source.width(),
                join.kind,
                join.condition.clone(),
            ));
            width += source.width();
        }
        op = Box::new(RowCacheOperator {
            child: op,
            slots: plan.row_cache_slots,
        });

        if let Some(filter) = &plan.filter {
            op = Box::new(FilterOperator::new(op, filter.clone()));
        }
        if let Some(grouping) = &plan.grouping {
            op = Box::new(AggregateOperator::new(
                op,
                grouping.keys.clone(),
                grouping.aggregates.clone(),
                grouping.cache_slots,
            ));
            if let Some(having) = &grouping.having {
                op = Box::new(FilterOperator::new(op, having.clone()));
            }
        }
        op = Box::new(ProjectOperator::new(
            op,
            plan.projection.clone(),
            plan.order_by.iter().map(|k| k.expr.clone()).collect(),
        ));
        if plan.distinct {
            op = Box::new(DistinctOperator::new(op));
        }
        if !plan.order_by.is_empty() {
            op = Box::new(SortOperator::new(
                op,
                plan.order_by.iter().map(|k| k.ascending).collect(),
            ));
        }
        if plan.skip.is_some() || plan.take.is_some() {
            op = Box::new(LimitOperator::new(op, plan.skip, plan.take));
        }

        let mut rows = Vec::new();
        while let Some(frame) = op.next()? {
            rows.push(frame.values);
        }
        Ok(rows)
    }
}
