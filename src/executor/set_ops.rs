//! Row-set semantics of UNION, UNION ALL, EXCEPT and INTERSECT.

use std::collections::HashSet;

use crate::ast::SetOperator;
use crate::types::Value;

fn key(row: &[Value], positions: Option<&[usize]>) -> Vec<Value> {
    match positions {
        Some(positions) => positions
            .iter()
            .map(|p| row.get(*p).cloned().unwrap_or(Value::Null))
            .collect(),
        None => row.to_vec(),
    }
}

/// Combines two fully evaluated operands.
///
/// Rows are matched on the values at `positions`, or on whole rows when no
/// keys were declared. Duplicate elimination keeps the first occurrence.
#[must_use]
pub fn combine(
    op: SetOperator,
    left: Vec<Vec<Value>>,
    right: Vec<Vec<Value>>,
    positions: Option<&[usize]>,
) -> Vec<Vec<Value>> {
    match op {
        SetOperator::UnionAll => {
            let mut rows = left;
            rows.extend(right);
            rows
        }
        SetOperator::Union => {
            let mut seen = HashSet::new();
            left.into_iter()
                .chain(right)
                .filter(|row| seen.insert(key(row, positions)))
                .collect()
        }
        SetOperator::Except | SetOperator::Intersect => {
            let right_keys: HashSet<Vec<Value>> =
                right.iter().map(|row| key(row, positions)).collect();
            let keep = op == SetOperator::Intersect;
            let mut seen = HashSet::new();
            left.into_iter()
                .filter(|row| {
                    let k = key(row, positions);
                    right_keys.contains(&k) == keep && seen.insert(k)
                })
                .collect()
        }
    }
}
