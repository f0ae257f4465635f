//! Executable plan produced by code generation.

use std::fmt;
use std::sync::Arc;

use crate::ast::{BinaryOp, JoinKind, SetOperator, UnaryOp};
use crate::binder::ScopeId;
use crate::catalog::Schema;
use crate::functions::{AggregateFunction, ScalarFunction};
use crate::types::{DataType, Value};

/// A compiled statement.
#[derive(Debug, Clone)]
pub struct ExecutablePlan {
    /// Common table expressions, materialized in order before the root.
    pub ctes: Vec<(String, PlanNode)>,
    pub root: PlanNode,
    pub columns: Vec<OutputColumn>,
}

impl ExecutablePlan {
    /// Returns the output column names.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Output column of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub name: String,
    pub data_type: DataType,
}

/// Row-producing plan node.
#[derive(Debug, Clone)]
pub enum PlanNode {
    Select(Box<SelectPlan>),
    /// `first op1 operand1 op2 operand2 ...`, evaluated left to right.
    SetChain {
        first: Box<PlanNode>,
        steps: Vec<SetStep>,
    },
}

/// One operator application in a set chain.
#[derive(Debug, Clone)]
pub struct SetStep {
    pub op: SetOperator,
    /// Column positions rows are compared on; `None` compares whole rows.
    pub key_positions: Option<Vec<usize>>,
    pub operand: PlanNode,
}

/// Plan of one SELECT.
#[derive(Debug, Clone)]
pub struct SelectPlan {
    pub scope: ScopeId,
    /// Sources in source order; the first is the outermost loop.
    pub sources: Vec<SourcePlan>,
    /// One entry per source after the first.
    pub joins: Vec<JoinPlan>,
    pub filter: Option<CompiledExpr>,
    pub grouping: Option<GroupingPlan>,
    pub projection: Vec<CompiledExpr>,
    pub distinct: bool,
    pub order_by: Vec<SortKey>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
    /// Number of cache slots reset for every source row.
    pub row_cache_slots: usize,
}

/// Row source of a SELECT.
#[derive(Debug, Clone)]
pub enum SourcePlan {
    Table {
        schema: Arc<dyn Schema>,
        method: String,
        args: Vec<Value>,
        alias: String,
        width: usize,
    },
    Cte {
        name: String,
        alias: String,
        width: usize,
    },
    Subquery {
        plan: Box<PlanNode>,
        alias: String,
        width: usize,
    },
}

impl SourcePlan {
    /// Returns the number of columns the source produces.
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            SourcePlan::Table { width, .. }
            | SourcePlan::Cte { width, .. }
            | SourcePlan::Subquery { width, .. } => *width,
        }
    }
}

/// Join of the rows so far with the next source.
#[derive(Debug, Clone)]
pub struct JoinPlan {
    pub kind: JoinKind,
    pub condition: Option<CompiledExpr>,
}

/// Grouping of source rows into group-result rows `keys ++ aggregates`.
#[derive(Debug, Clone)]
pub struct GroupingPlan {
    pub keys: Vec<CompiledExpr>,
    pub aggregates: Vec<AggregatePlan>,
    pub having: Option<CompiledExpr>,
    /// Number of cache slots reset for every group.
    pub cache_slots: usize,
}

/// One aggregate column of a group-result row.
#[derive(Debug, Clone)]
pub struct AggregatePlan {
    pub function: AggregateFunction,
    /// `None` for `COUNT(*)`.
    pub arg: Option<CompiledExpr>,
    pub distinct: bool,
    pub data_type: DataType,
}

/// ORDER BY key.
#[derive(Debug, Clone)]
pub struct SortKey {
    pub expr: CompiledExpr,
    pub ascending: bool,
}

/// Expression lowered against a positional row.
#[derive(Debug, Clone)]
pub enum CompiledExpr {
    Const(Value),
    /// Positional access into the current row.
    Slot { ordinal: usize, name: String },
    Member {
        target: Box<CompiledExpr>,
        member: String,
    },
    Index {
        target: Box<CompiledExpr>,
        index: Box<CompiledExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<CompiledExpr>,
        right: Box<CompiledExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<CompiledExpr>,
    },
    Call {
        function: Arc<ScalarFunction>,
        args: Vec<CompiledExpr>,
    },
    Case {
        whens: Vec<(CompiledExpr, CompiledExpr)>,
        otherwise: Option<Box<CompiledExpr>>,
    },
    InList {
        expr: Box<CompiledExpr>,
        list: Vec<CompiledExpr>,
        negated: bool,
    },
    Between {
        expr: Box<CompiledExpr>,
        low: Box<CompiledExpr>,
        high: Box<CompiledExpr>,
        negated: bool,
    },
    IsNull {
        operand: Box<CompiledExpr>,
        negated: bool,
    },
    /// Computed on first use in a row, then read from the slot.
    Cached {
        slot: usize,
        expr: Box<CompiledExpr>,
    },
}

// ==================== EXPLAIN rendering ====================

fn write_list(f: &mut fmt::Formatter<'_>, items: &[CompiledExpr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompiledExpr::Const(value) => write!(f, "{value}"),
            CompiledExpr::Slot { ordinal, name } => write!(f, "{name}#{ordinal}"),
            CompiledExpr::Member { target, member } => write!(f, "{target}.{member}"),
            CompiledExpr::Index { target, index } => write!(f, "{target}[{index}]"),
            CompiledExpr::Binary { op, left, right } => {
                write!(f, "({left} {} {right})", op.as_str())
            }
            CompiledExpr::Unary { op, operand } => write!(f, "({}{operand})", op.as_str()),
            CompiledExpr::Call { function, args } => {
                write!(f, "{}(", function.name())?;
                write_list(f, args)?;
                f.write_str(")")
            }
            CompiledExpr::Case { whens, otherwise } => {
                f.write_str("CASE")?;
                for (cond, result) in whens {
                    write!(f, " WHEN {cond} THEN {result}")?;
                }
                if let Some(e) = otherwise {
                    write!(f, " ELSE {e}")?;
                }
                f.write_str(" END")
            }
            CompiledExpr::InList {
                expr,
                list,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "({expr} {not}IN (")?;
                write_list(f, list)?;
                f.write_str("))")
            }
            CompiledExpr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "({expr} {not}BETWEEN {low} AND {high})")
            }
            CompiledExpr::IsNull { operand, negated } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "({operand} IS {not}NULL)")
            }
            CompiledExpr::Cached { slot, expr } => write!(f, "cache[{slot}]:{expr}"),
        }
    }
}

impl fmt::Display for SourcePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourcePlan::Table {
                schema,
                method,
                args,
                alias,
                width,
            } => {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(
                    f,
                    "Scan #{}.{method}({}) {alias} width={width}",
                    schema.name(),
                    args.join(", ")
                )
            }
            SourcePlan::Cte { name, alias, width } => {
                write!(f, "CteScan {name} {alias} width={width}")
            }
            SourcePlan::Subquery { alias, width, .. } => {
                write!(f, "SubqueryScan {alias} width={width}")
            }
        }
    }
}

impl PlanNode {
    fn describe(&self, indent: usize, out: &mut String) {
        let prefix = "  ".repeat(indent);
        match self {
            PlanNode::Select(select) => select.describe(indent, out),
            PlanNode::SetChain { first, steps } => {
                out.push_str(&format!("{prefix}SetChain\n"));
                first.describe(indent + 1, out);
                for step in steps {
                    let keys = match &step.key_positions {
                        Some(positions) => format!(" keys={positions:?}"),
                        None => String::new(),
                    };
                    out.push_str(&format!("{prefix}  {}{keys}\n", step.op.as_str()));
                    step.operand.describe(indent + 1, out);
                }
            }
        }
    }
}

impl SelectPlan {
    fn describe(&self, indent: usize, out: &mut String) {
        let prefix = "  ".repeat(indent);
        let group_slots = self.grouping.as_ref().map_or(0, |g| g.cache_slots);
        out.push_str(&format!(
            "{prefix}Select scope={} cache(row={}, group={group_slots})\n",
            self.scope.index(),
            self.row_cache_slots
        ));
        for (i, source) in self.sources.iter().enumerate() {
            if i > 0 {
                if let Some(join) = self.joins.get(i - 1) {
                    out.push_str(&format!("{prefix}  {}", join.kind.as_str()));
                    if let Some(condition) = &join.condition {
                        out.push_str(&format!(" ON {condition}"));
                    }
                    out.push('\n');
                }
            }
            out.push_str(&format!("{prefix}  {source}\n"));
            if let SourcePlan::Subquery { plan, .. } = source {
                plan.describe(indent + 2, out);
            }
        }
        if let Some(filter) = &self.filter {
            out.push_str(&format!("{prefix}  Filter {filter}\n"));
        }
        if let Some(grouping) = &self.grouping {
            let keys: Vec<String> = grouping.keys.iter().map(ToString::to_string).collect();
            let aggregates: Vec<String> = grouping
                .aggregates
                .iter()
                .map(|a| {
                    let distinct = if a.distinct { "DISTINCT " } else { "" };
                    let arg = a.arg.as_ref().map_or_else(|| "*".to_string(), ToString::to_string);
                    format!("{}({distinct}{arg})", a.function.name())
                })
                .collect();
            out.push_str(&format!(
                "{prefix}  Aggregate keys=[{}] aggregates=[{}]\n",
                keys.join(", "),
                aggregates.join(", ")
            ));
            if let Some(having) = &grouping.having {
                out.push_str(&format!("{prefix}  Having {having}\n"));
            }
        }
        let fields: Vec<String> = self.projection.iter().map(ToString::to_string).collect();
        out.push_str(&format!("{prefix}  Project [{}]\n", fields.join(", ")));
        if self.distinct {
            out.push_str(&format!("{prefix}  Distinct\n"));
        }
        if !self.order_by.is_empty() {
            let keys: Vec<String> = self
                .order_by
                .iter()
                .map(|k| format!("{} {}", k.expr, if k.ascending { "ASC" } else { "DESC" }))
                .collect();
            out.push_str(&format!("{prefix}  Sort [{}]\n", keys.join(", ")));
        }
        if self.skip.is_some() || self.take.is_some() {
            let skip = self.skip.unwrap_or(0);
            let take = self.take.map_or_else(|| "all".to_string(), |t| t.to_string());
            out.push_str(&format!("{prefix}  Limit skip={skip} take={take}\n"));
        }
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.describe(0, &mut out);
        f.write_str(out.trim_end())
    }
}

impl fmt::Display for ExecutablePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for (name, plan) in &self.ctes {
            out.push_str(&format!("Cte {name}\n"));
            plan.describe(1, &mut out);
        }
        let columns: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        out.push_str(&format!("Output [{}]\n", columns.join(", ")));
        self.root.describe(1, &mut out);
        f.write_str(out.trim_end())
    }
}
