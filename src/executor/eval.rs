//! Row-level evaluation of compiled expressions.

use std::cmp::Ordering;

use crate::ast::{BinaryOp, UnaryOp};
use crate::codegen::CompiledExpr;
use crate::error::{QuarryError, Result};
use crate::types::Value;

/// Evaluates an expression against a row, filling cache slots on first use.
///
/// # Errors
///
/// Returns an error for division by zero, integer overflow, operand types
/// the runtime cannot combine, a slot outside the row or a failing
/// function call.
pub fn evaluate(expr: &CompiledExpr, row: &[Value], cache: &mut [Option<Value>]) -> Result<Value> {
    match expr {
        CompiledExpr::Const(value) => Ok(value.clone()),
        CompiledExpr::Slot { ordinal, name } => row.get(*ordinal).cloned().ok_or_else(|| {
            QuarryError::ExecutionError(format!(
                "Slot {ordinal} ({name}) is outside a row of width {}",
                row.len()
            ))
        }),
        CompiledExpr::Cached { slot, expr } => {
            if let Some(Some(value)) = cache.get(*slot) {
                return Ok(value.clone());
            }
            let value = evaluate(expr, row, cache)?;
            let entry = cache.get_mut(*slot).ok_or_else(|| {
                QuarryError::ExecutionError(format!("Cache slot {slot} was not allocated"))
            })?;
            *entry = Some(value.clone());
            Ok(value)
        }
        CompiledExpr::Member { target, member } => {
            match evaluate(target, row, cache)? {
                Value::Null => Ok(Value::Null),
                Value::Record(record) => Ok(record.get(member).cloned().unwrap_or(Value::Null)),
                other => Err(QuarryError::ExecutionError(format!(
                    "Cannot access member '{member}' of {other}"
                ))),
            }
        }
        CompiledExpr::Index { target, index } => {
            let target = evaluate(target, row, cache)?;
            let index = evaluate(index, row, cache)?;
            index_value(target, &index)
        }
        CompiledExpr::Binary { op, left, right } => {
            let left = evaluate(left, row, cache)?;
            // The right operand of AND/OR only runs when it can change the result.
            match (op, &left) {
                (BinaryOp::And, Value::Bool(false)) => return Ok(Value::Bool(false)),
                (BinaryOp::Or, Value::Bool(true)) => return Ok(Value::Bool(true)),
                _ => {}
            }
            let right = evaluate(right, row, cache)?;
            binary(*op, &left, &right)
        }
        CompiledExpr::Unary { op, operand } => unary(*op, evaluate(operand, row, cache)?),
        CompiledExpr::Call { function, args } => {
            let values = args
                .iter()
                .map(|a| evaluate(a, row, cache))
                .collect::<Result<Vec<_>>>()?;
            function.invoke(&values)
        }
        CompiledExpr::Case { whens, otherwise } => {
            for (condition, result) in whens {
                if is_true(&evaluate(condition, row, cache)?) {
                    return evaluate(result, row, cache);
                }
            }
            match otherwise {
                Some(e) => evaluate(e, row, cache),
                None => Ok(Value::Null),
            }
        }
        CompiledExpr::InList {
            expr,
            list,
            negated,
        } => {
            let target = evaluate(expr, row, cache)?;
            if target.is_null() {
                return Ok(Value::Null);
            }
            let mut saw_null = false;
            for item in list {
                match values_equal(&target, &evaluate(item, row, cache)?) {
                    Some(true) => return Ok(Value::Bool(!negated)),
                    Some(false) => {}
                    None => saw_null = true,
                }
            }
            Ok(if saw_null {
                Value::Null
            } else {
                Value::Bool(*negated)
            })
        }
        CompiledExpr::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let target = evaluate(expr, row, cache)?;
            let low = evaluate(low, row, cache)?;
            let high = evaluate(high, row, cache)?;
            if target.is_null() || low.is_null() || high.is_null() {
                return Ok(Value::Null);
            }
            let above = ordering(&target, &low, "BETWEEN")? != Ordering::Less;
            let below = ordering(&target, &high, "BETWEEN")? != Ordering::Greater;
            Ok(Value::Bool((above && below) != *negated))
        }
        CompiledExpr::IsNull { operand, negated } => {
            let null = evaluate(operand, row, cache)?.is_null();
            Ok(Value::Bool(null != *negated))
        }
    }
}

/// Returns true only for `TRUE`; `NULL` and `FALSE` reject a row.
#[must_use]
pub fn is_true(value: &Value) -> bool {
    matches!(value, Value::Bool(true))
}

/// SQL equality: `None` when either side is null.
fn values_equal(left: &Value, right: &Value) -> Option<bool> {
    if left.is_null() || right.is_null() {
        return None;
    }
    Some(match left.compare(right) {
        Some(ord) => ord == Ordering::Equal,
        None => left == right,
    })
}

fn ordering(left: &Value, right: &Value, op: &str) -> Result<Ordering> {
    left.compare(right).ok_or_else(|| {
        QuarryError::ExecutionError(format!("Cannot compare {left} and {right} with {op}"))
    })
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    match op {
        BinaryOp::And => Ok(match (left, right) {
            (Value::Bool(false), _) | (_, Value::Bool(false)) => Value::Bool(false),
            (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
            _ => Value::Null,
        }),
        BinaryOp::Or => Ok(match (left, right) {
            (Value::Bool(true), _) | (_, Value::Bool(true)) => Value::Bool(true),
            (Value::Bool(false), Value::Bool(false)) => Value::Bool(false),
            _ => Value::Null,
        }),
        _ if left.is_null() || right.is_null() => Ok(Value::Null),
        BinaryOp::Eq => Ok(Value::Bool(values_equal(left, right) == Some(true))),
        BinaryOp::Neq => Ok(Value::Bool(values_equal(left, right) == Some(false))),
        BinaryOp::Lt => Ok(Value::Bool(ordering(left, right, "<")? == Ordering::Less)),
        BinaryOp::Lte => Ok(Value::Bool(ordering(left, right, "<=")? != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Bool(ordering(left, right, ">")? == Ordering::Greater)),
        BinaryOp::Gte => Ok(Value::Bool(ordering(left, right, ">=")? != Ordering::Less)),
        BinaryOp::Like => match (left, right) {
            (Value::String(text), Value::String(pattern)) => Ok(Value::Bool(like(text, pattern))),
            _ => Err(QuarryError::ExecutionError(format!(
                "LIKE requires strings, got {left} and {right}"
            ))),
        },
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(op, left, right)
        }
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    let overflow = || {
        QuarryError::ExecutionError(format!("Integer overflow in {left} {} {right}", op.as_str()))
    };
    match (left, right) {
        (Value::String(a), Value::String(b)) if op == BinaryOp::Add => {
            Ok(Value::String(format!("{a}{b}")))
        }
        (Value::Int64(a), Value::Int64(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(*b),
                BinaryOp::Sub => a.checked_sub(*b),
                BinaryOp::Mul => a.checked_mul(*b),
                BinaryOp::Div | BinaryOp::Mod if *b == 0 => return Err(QuarryError::DivisionByZero),
                BinaryOp::Div => a.checked_div(*b),
                _ => a.checked_rem(*b),
            };
            result.map(Value::Int64).ok_or_else(overflow)
        }
        _ => {
            let (Some(a), Some(b)) = (left.as_float64(), right.as_float64()) else {
                return Err(QuarryError::ExecutionError(format!(
                    "Cannot apply {} to {left} and {right}",
                    op.as_str()
                )));
            };
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div | BinaryOp::Mod if b == 0.0 => return Err(QuarryError::DivisionByZero),
                BinaryOp::Div => a / b,
                _ => a % b,
            };
            Ok(Value::Float64(result))
        }
    }
}

fn unary(op: UnaryOp, operand: Value) -> Result<Value> {
    match (op, operand) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOp::Neg, Value::Int64(i)) => i
            .checked_neg()
            .map(Value::Int64)
            .ok_or_else(|| QuarryError::ExecutionError(format!("Integer overflow in -{i}"))),
        (UnaryOp::Neg, Value::Float64(f)) => Ok(Value::Float64(-f)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (op, other) => Err(QuarryError::ExecutionError(format!(
            "Cannot apply {}to {other}",
            op.as_str()
        ))),
    }
}

fn index_value(target: Value, index: &Value) -> Result<Value> {
    if target.is_null() || index.is_null() {
        return Ok(Value::Null);
    }
    let Some(position) = index.as_int64() else {
        return Err(QuarryError::ExecutionError(format!("Index {index} is not an integer")));
    };
    let Ok(position) = usize::try_from(position) else {
        return Ok(Value::Null);
    };
    match target {
        Value::Array(mut items) => Ok(if position < items.len() {
            items.swap_remove(position)
        } else {
            Value::Null
        }),
        Value::String(s) => Ok(s
            .chars()
            .nth(position)
            .map_or(Value::Null, |c| Value::String(c.to_string()))),
        other => Err(QuarryError::ExecutionError(format!("Cannot index into {other}"))),
    }
}

/// Matches `%` (any run) and `_` (one character) wildcards.
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    // matches[j]: pattern[..i] matches text[..j]
    let mut matches = vec![false; text.len() + 1];
    matches[0] = true;
    for p in &pattern {
        let mut next = vec![false; text.len() + 1];
        match p {
            '%' => {
                let mut any = false;
                for j in 0..=text.len() {
                    any |= matches[j];
                    next[j] = any;
                }
            }
            _ => {
                for j in 1..=text.len() {
                    next[j] = matches[j - 1] && (*p == '_' || *p == text[j - 1]);
                }
            }
        }
        matches = next;
    }
    matches[text.len()]
}
