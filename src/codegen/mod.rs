//! Code generation: lowers a bound, rewritten statement to an
//! [`ExecutablePlan`].
//!
//! Every column is resolved against the scope recorded in its SELECT. The
//! generator also replays scope creation order with a [`ScopeCursor`] and
//! fails if the two disagree.

mod plan;

pub use plan::{
    AggregatePlan, CompiledExpr, ExecutablePlan, GroupingPlan, JoinPlan, OutputColumn, PlanNode,
    SelectPlan, SetStep, SortKey, SourcePlan,
};

use tracing::{debug, instrument};

use crate::ast::{Expr, ExprKind, NodeKind, Query, SelectQuery, Source, Statement};
use crate::binder::{Scope, ScopeCursor, ScopeTree, SourceBinding, SymbolEntry};
use crate::cse::{CacheSlots, Phase};
use crate::error::{BindError, QuarryError, Result, StructuralError};
use crate::functions::{AggregateFunction, FunctionRegistry};
use crate::types::Value;
use crate::visit::{flatten_joins, flatten_set_chain, QueryPart};

const PASS: &str = "codegen";

/// Lowers statements to executable plans.
pub struct CodeGenerator<'a> {
    scopes: &'a ScopeTree,
    slots: &'a CacheSlots,
    functions: &'a FunctionRegistry,
    cursor: ScopeCursor<'a>,
}

impl<'a> CodeGenerator<'a> {
    #[must_use]
    pub fn new(
        scopes: &'a ScopeTree,
        slots: &'a CacheSlots,
        functions: &'a FunctionRegistry,
    ) -> Self {
        CodeGenerator {
            scopes,
            slots,
            functions,
            cursor: scopes.cursor(),
        }
    }

    /// Generates the plan of a statement.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation if the statement and scope tree
    /// disagree, a structural error for a join column left on a source
    /// alias, or an unsupported-node error for nodes that must not survive
    /// the rewrites.
    #[instrument(level = "trace", skip_all, name = "codegen")]
    pub fn generate(mut self, statement: &Statement) -> Result<ExecutablePlan> {
        let mut ctes = Vec::new();
        if let Statement::With { ctes: defs, .. } = statement {
            for cte in defs {
                ctes.push((cte.name.to_lowercase(), self.query(&cte.query)?));
            }
        }
        let body = statement.body();
        let columns = output_columns(body)?;
        let root = self.query(body)?;
        debug!(
            ctes = ctes.len(),
            columns = columns.len(),
            slots = self.slots.total(),
            "generated plan"
        );
        Ok(ExecutablePlan {
            ctes,
            root,
            columns,
        })
    }

    fn query(&mut self, query: &Query) -> Result<PlanNode> {
        match query {
            Query::Select(select) => Ok(PlanNode::Select(Box::new(self.select(select)?))),
            Query::SetOperation(set) => {
                let chain = flatten_set_chain(set);
                let mut operands = chain.operands.into_iter();
                let first = operands
                    .next()
                    .ok_or_else(|| QuarryError::underflow(PASS, "set chain operand", 1, 0))?;
                let names = output_columns(first)?;
                let first = self.query(first)?;

                let mut steps = Vec::with_capacity(chain.operators.len());
                for (operator, operand) in chain.operators.iter().zip(operands) {
                    let key_positions = if operator.keys.is_empty() {
                        None
                    } else {
                        let positions = operator
                            .keys
                            .iter()
                            .map(|key| {
                                names
                                    .iter()
                                    .position(|c| c.name.eq_ignore_ascii_case(key))
                                    .ok_or_else(|| {
                                        QuarryError::from(StructuralError::UnknownSetKey {
                                            key: key.clone(),
                                            operand: 0,
                                        })
                                    })
                            })
                            .collect::<Result<Vec<_>>>()?;
                        Some(positions)
                    };
                    steps.push(SetStep {
                        op: operator.op,
                        key_positions,
                        operand: self.query(operand)?,
                    });
                }
                if steps.len() != chain.operators.len() {
                    return Err(QuarryError::underflow(
                        PASS,
                        "set chain operand",
                        chain.operators.len(),
                        steps.len(),
                    ));
                }
                Ok(PlanNode::SetChain {
                    first: Box::new(first),
                    steps,
                })
            }
        }
    }

    fn select(&mut self, select: &SelectQuery) -> Result<SelectPlan> {
        let scope_id = select
            .scope
            .ok_or_else(|| QuarryError::underflow(PASS, "resolve select scope", 1, 0))?;
        let entered = self.cursor.next_child()?;
        if entered != scope_id {
            return Err(QuarryError::underflow(
                PASS,
                "scope cursor order",
                scope_id.index(),
                entered.index(),
            ));
        }
        let scope = self.scopes.scope(scope_id)?;
        let grouped = select.is_grouped();

        let chain = flatten_joins(&select.from);
        let mut sources = vec![self.source(scope, chain.first)?];
        let mut joins = Vec::with_capacity(chain.steps.len());
        for step in &chain.steps {
            sources.push(self.source(scope, step.source)?);
            let condition = step
                .on
                .map(|on| self.lower(scope, on, QueryPart::Join, grouped))
                .transpose()?;
            joins.push(JoinPlan {
                kind: step.kind,
                condition,
            });
        }

        let filter = select
            .where_clause
            .as_ref()
            .map(|e| self.lower(scope, e, QueryPart::Where, grouped))
            .transpose()?;

        let grouping = match &select.group_by {
            Some(group_by) => {
                let keys = group_by
                    .keys
                    .iter()
                    .map(|k| self.lower(scope, k, QueryPart::GroupBy, grouped))
                    .collect::<Result<Vec<_>>>()?;
                let mut aggregates = Vec::with_capacity(group_by.aggregates.len());
                for call in &group_by.aggregates {
                    let function = AggregateFunction::parse(&call.function)
                        .ok_or_else(|| QuarryError::unsupported(PASS, NodeKind::Call))?;
                    aggregates.push(AggregatePlan {
                        function,
                        arg: call
                            .arg
                            .as_ref()
                            .map(|a| self.lower(scope, a, QueryPart::GroupBy, grouped))
                            .transpose()?,
                        distinct: call.distinct,
                        data_type: call.data_type.clone(),
                    });
                }
                let having = group_by
                    .having
                    .as_ref()
                    .map(|h| self.lower(scope, h, QueryPart::Having, grouped))
                    .transpose()?;
                Some(GroupingPlan {
                    keys,
                    aggregates,
                    having,
                    cache_slots: self.slots.slot_count(scope_id, Phase::Group),
                })
            }
            None => None,
        };

        let projection = select
            .fields
            .iter()
            .map(|f| self.lower(scope, &f.expr, QueryPart::Select, grouped))
            .collect::<Result<Vec<_>>>()?;
        let order_by = select
            .order_by
            .iter()
            .map(|item| {
                Ok(SortKey {
                    expr: self.lower(scope, &item.expr, QueryPart::OrderBy, grouped)?,
                    ascending: item.ascending,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let left = self.cursor.parent()?;
        if Some(left) != scope.parent() {
            return Err(QuarryError::underflow(
                PASS,
                "scope cursor parent",
                scope.parent().map_or(0, |p| p.index()),
                left.index(),
            ));
        }

        Ok(SelectPlan {
            scope: scope_id,
            sources,
            joins,
            filter,
            grouping,
            projection,
            distinct: select.distinct,
            order_by,
            skip: select.skip,
            take: select.take,
            row_cache_slots: self.slots.slot_count(scope_id, Phase::Row),
        })
    }

    fn source(&mut self, scope: &Scope, source: &Source) -> Result<SourcePlan> {
        let alias = source.alias.clone();
        let entry = scope
            .lookup(&source.alias)
            .ok_or_else(|| BindError::UnknownAlias(source.alias.clone()))?;
        let SymbolEntry::Source { symbol, binding } = entry else {
            return Err(QuarryError::unsupported(PASS, source.node_kind()));
        };
        let width = symbol.len();
        match (binding, &source.kind) {
            (
                SourceBinding::Schema {
                    schema,
                    method,
                    args,
                },
                _,
            ) => Ok(SourcePlan::Table {
                schema: schema.clone(),
                method: method.clone(),
                args: args.clone(),
                alias,
                width,
            }),
            (SourceBinding::Cte(name), _) => Ok(SourcePlan::Cte {
                name: name.clone(),
                alias,
                width,
            }),
            (SourceBinding::Subquery, crate::ast::SourceKind::Subquery(query)) => {
                Ok(SourcePlan::Subquery {
                    plan: Box::new(self.query(query)?),
                    alias,
                    width,
                })
            }
            (SourceBinding::Subquery, _) => Err(QuarryError::unsupported(PASS, source.node_kind())),
        }
    }

    /// Lowers one expression, wrapping cached subexpressions.
    fn lower(&self, scope: &Scope, expr: &Expr, part: QueryPart, grouped: bool) -> Result<CompiledExpr> {
        let phase = Phase::of(part, grouped);
        let compiled = self.lower_node(scope, expr, part, grouped, phase)?;
        match self.slots.slot(scope.id(), phase, &expr.key()) {
            Some(slot) => Ok(CompiledExpr::Cached {
                slot,
                expr: Box::new(compiled),
            }),
            None => Ok(compiled),
        }
    }

    fn lower_node(
        &self,
        scope: &Scope,
        expr: &Expr,
        part: QueryPart,
        grouped: bool,
        phase: Phase,
    ) -> Result<CompiledExpr> {
        let lower = |e: &Expr| self.lower(scope, e, part, grouped).map(Box::new);
        Ok(match &expr.kind {
            ExprKind::Literal(value) => CompiledExpr::Const(value.clone()),
            ExprKind::Null => CompiledExpr::Const(Value::Null),
            ExprKind::Column { alias, name, .. } => {
                if phase == Phase::Group {
                    return Err(QuarryError::unsupported(PASS, NodeKind::Column));
                }
                self.column(scope, alias, name)?
            }
            ExprKind::GroupRef { ordinal, label } => {
                if phase != Phase::Group {
                    return Err(QuarryError::unsupported(PASS, NodeKind::GroupRef));
                }
                CompiledExpr::Slot {
                    ordinal: *ordinal,
                    name: label.clone(),
                }
            }
            ExprKind::Member { target, member } => CompiledExpr::Member {
                target: lower(target)?,
                member: member.clone(),
            },
            ExprKind::Index { target, index } => CompiledExpr::Index {
                target: lower(target)?,
                index: lower(index)?,
            },
            ExprKind::Binary { op, left, right } => CompiledExpr::Binary {
                op: *op,
                left: lower(left)?,
                right: lower(right)?,
            },
            ExprKind::Unary { op, operand } => CompiledExpr::Unary {
                op: *op,
                operand: lower(operand)?,
            },
            ExprKind::Call { name, args, .. } => {
                let function = self.functions.scalar(name).ok_or_else(|| {
                    if AggregateFunction::parse(name).is_some() {
                        QuarryError::unsupported(PASS, NodeKind::Call)
                    } else {
                        BindError::UnknownFunction {
                            name: name.to_uppercase(),
                            args: format!("{} argument(s)", args.len()),
                        }
                        .into()
                    }
                })?;
                CompiledExpr::Call {
                    function,
                    args: args
                        .iter()
                        .map(|a| self.lower(scope, a, part, grouped))
                        .collect::<Result<_>>()?,
                }
            }
            ExprKind::Case { whens, otherwise } => CompiledExpr::Case {
                whens: whens
                    .iter()
                    .map(|(c, r)| Ok((*lower(c)?, *lower(r)?)))
                    .collect::<Result<_>>()?,
                otherwise: otherwise.as_deref().map(lower).transpose()?,
            },
            ExprKind::InList {
                expr: target,
                list,
                negated,
            } => CompiledExpr::InList {
                expr: lower(target)?,
                list: list
                    .iter()
                    .map(|e| self.lower(scope, e, part, grouped))
                    .collect::<Result<_>>()?,
                negated: *negated,
            },
            ExprKind::Between {
                expr: target,
                low,
                high,
                negated,
            } => CompiledExpr::Between {
                expr: lower(target)?,
                low: lower(low)?,
                high: lower(high)?,
                negated: *negated,
            },
            ExprKind::IsNull { operand, negated } => CompiledExpr::IsNull {
                operand: lower(operand)?,
                negated: *negated,
            },
            ExprKind::Identifier(_) | ExprKind::Star => {
                return Err(QuarryError::unsupported(PASS, expr.node_kind()));
            }
        })
    }

    /// Resolves a column to its position in the scope's row.
    fn column(&self, scope: &Scope, alias: &str, name: &str) -> Result<CompiledExpr> {
        if let (Some(row_alias), Some(row)) = (scope.row_alias(), scope.row_symbol()) {
            if row.is_merged() && alias != row_alias {
                return Err(StructuralError::UnresolvedJoinAlias {
                    alias: alias.to_string(),
                    row_alias: row_alias.to_string(),
                }
                .into());
            }
        }
        let symbol = scope
            .symbol(alias)
            .ok_or_else(|| BindError::UnknownAlias(alias.to_string()))?;
        let column = symbol.column(name).ok_or_else(|| BindError::UnknownColumn {
            alias: alias.to_string(),
            column: name.to_string(),
        })?;
        Ok(CompiledExpr::Slot {
            ordinal: column.ordinal,
            name: format!("{alias}.{name}"),
        })
    }
}

/// Output columns of a query: the first operand's fields for set chains.
fn output_columns(query: &Query) -> Result<Vec<OutputColumn>> {
    let mut current = query;
    loop {
        match current {
            Query::Select(select) => {
                return Ok(select
                    .fields
                    .iter()
                    .map(|f| OutputColumn {
                        name: f.name(),
                        data_type: f.expr.data_type(),
                    })
                    .collect());
            }
            Query::SetOperation(set) => {
                current = flatten_set_chain(set)
                    .operands
                    .first()
                    .copied()
                    .ok_or_else(|| QuarryError::underflow(PASS, "set chain operand", 1, 0))?;
            }
        }
    }
}
