//! Grouping operator: buckets source rows and streams aggregate state.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::codegen::{AggregatePlan, CompiledExpr};
use crate::error::{QuarryError, Result};
use crate::executor::eval::evaluate;
use crate::executor::{Frame, PhysicalOperator};
use crate::functions::AggregateFunction;
use crate::types::Value;

/// Running state of one aggregate within one group.
#[derive(Debug, Clone)]
enum Accumulator {
    Count(i64),
    Sum(Option<Value>),
    Avg { sum: f64, count: i64 },
    Min(Option<Value>),
    Max(Option<Value>),
}

#[derive(Debug, Clone)]
struct AggregateState {
    accumulator: Accumulator,
    /// Values already folded in, for `DISTINCT` aggregates.
    seen: Option<HashSet<Value>>,
}

impl AggregateState {
    fn new(plan: &AggregatePlan) -> Self {
        let accumulator = match plan.function {
            AggregateFunction::Count => Accumulator::Count(0),
            AggregateFunction::Sum => Accumulator::Sum(None),
            AggregateFunction::Avg => Accumulator::Avg { sum: 0.0, count: 0 },
            AggregateFunction::Min => Accumulator::Min(None),
            AggregateFunction::Max => Accumulator::Max(None),
        };
        AggregateState {
            accumulator,
            seen: plan.distinct.then(HashSet::new),
        }
    }

    /// Folds one input. `None` stands for the row itself (`COUNT(*)`).
    fn update(&mut self, input: Option<Value>) -> Result<()> {
        let value = match input {
            None => {
                if let Accumulator::Count(n) = &mut self.accumulator {
                    *n += 1;
                }
                return Ok(());
            }
            Some(Value::Null) => return Ok(()),
            Some(value) => value,
        };
        if let Some(seen) = &mut self.seen {
            if !seen.insert(value.clone()) {
                return Ok(());
            }
        }
        match &mut self.accumulator {
            Accumulator::Count(n) => *n += 1,
            Accumulator::Sum(total) => {
                *total = Some(match total.take() {
                    None => value,
                    Some(current) => add(&current, &value)?,
                });
            }
            Accumulator::Avg { sum, count } => {
                *sum += value.as_float64().ok_or_else(|| {
                    QuarryError::ExecutionError(format!("AVG over non-numeric value {value}"))
                })?;
                *count += 1;
            }
            Accumulator::Min(best) => {
                let replace = match best.as_ref() {
                    Some(b) => value.sort_cmp(b).is_lt(),
                    None => true,
                };
                if replace {
                    *best = Some(value);
                }
            }
            Accumulator::Max(best) => {
                let replace = match best.as_ref() {
                    Some(b) => value.sort_cmp(b).is_gt(),
                    None => true,
                };
                if replace {
                    *best = Some(value);
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self) -> Value {
        match self.accumulator {
            Accumulator::Count(n) => Value::Int64(n),
            Accumulator::Sum(total) | Accumulator::Min(total) | Accumulator::Max(total) => {
                total.unwrap_or(Value::Null)
            }
            Accumulator::Avg { count: 0, .. } => Value::Null,
            Accumulator::Avg { sum, count } => Value::Float64(sum / count as f64),
        }
    }
}

fn add(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Int64(a), Value::Int64(b)) => a
            .checked_add(*b)
            .map(Value::Int64)
            .ok_or_else(|| QuarryError::ExecutionError("Integer overflow in SUM".into())),
        _ => match (left.as_float64(), right.as_float64()) {
            (Some(a), Some(b)) => Ok(Value::Float64(a + b)),
            _ => Err(QuarryError::ExecutionError(format!(
                "SUM over non-numeric value {right}"
            ))),
        },
    }
}

/// Buckets child frames by key values in first-seen order and emits one
/// group-result row `keys ++ aggregates` per bucket.
///
/// Without keys there is exactly one group, even over zero rows.
pub struct AggregateOperator {
    child: Box<dyn PhysicalOperator>,
    keys: Vec<CompiledExpr>,
    aggregates: Vec<AggregatePlan>,
    group_cache_slots: usize,
    output: Option<std::vec::IntoIter<Vec<Value>>>,
}

impl AggregateOperator {
    #[must_use]
    pub fn new(
        child: Box<dyn PhysicalOperator>,
        keys: Vec<CompiledExpr>,
        aggregates: Vec<AggregatePlan>,
        group_cache_slots: usize,
    ) -> Self {
        AggregateOperator {
            child,
            keys,
            aggregates,
            group_cache_slots,
            output: None,
        }
    }

    fn build(&mut self) -> Result<Vec<Vec<Value>>> {
        let mut groups: IndexMap<Vec<Value>, Vec<AggregateState>> = IndexMap::new();
        while let Some(mut frame) = self.child.next()? {
            let key = self
                .keys
                .iter()
                .map(|k| evaluate(k, &frame.values, &mut frame.cache))
                .collect::<Result<Vec<_>>>()?;
            let states = groups
                .entry(key)
                .or_insert_with(|| self.aggregates.iter().map(AggregateState::new).collect());
            for (state, plan) in states.iter_mut().zip(&self.aggregates) {
                let input = plan
                    .arg
                    .as_ref()
                    .map(|arg| evaluate(arg, &frame.values, &mut frame.cache))
                    .transpose()?;
                state.update(input)?;
            }
        }
        if groups.is_empty() && self.keys.is_empty() {
            groups.insert(
                Vec::new(),
                self.aggregates.iter().map(AggregateState::new).collect(),
            );
        }
        Ok(groups
            .into_iter()
            .map(|(mut row, states)| {
                row.extend(states.into_iter().map(AggregateState::finish));
                row
            })
            .collect())
    }
}

impl PhysicalOperator for AggregateOperator {
    fn next(&mut self) -> Result<Option<Frame>> {
        if self.output.is_none() {
            self.output = Some(self.build()?.into_iter());
        }
        let slots = self.group_cache_slots;
        Ok(self
            .output
            .as_mut()
            .and_then(Iterator::next)
            .map(|row| Frame::with_cache(row, slots)))
    }
}
