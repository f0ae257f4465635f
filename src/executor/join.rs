//! Nested-loop join operator.

use crate::ast::JoinKind;
use crate::codegen::CompiledExpr;
use crate::error::Result;
use crate::executor::eval::{evaluate, is_true};
use crate::executor::{Frame, PhysicalOperator};
use crate::types::Value;

/// Joins the rows of its child (the sources merged so far) with one
/// materialized source.
///
/// The child drives the outer loop. For `RightOuter`, right rows that never
/// matched are emitted after the child is exhausted.
pub struct NestedLoopJoinOperator {
    left: Box<dyn PhysicalOperator>,
    left_width: usize,
    right: Vec<Vec<Value>>,
    right_width: usize,
    kind: JoinKind,
    condition: Option<CompiledExpr>,
    current: Option<Vec<Value>>,
    position: usize,
    matched: bool,
    right_matched: Vec<bool>,
    unmatched_cursor: Option<usize>,
}

impl NestedLoopJoinOperator {
    #[must_use]
    pub fn new(
        left: Box<dyn PhysicalOperator>,
        left_width: usize,
        right: Vec<Vec<Value>>,
        right_width: usize,
        kind: JoinKind,
        condition: Option<CompiledExpr>,
    ) -> Self {
        let right_matched = vec![false; right.len()];
        NestedLoopJoinOperator {
            left,
            left_width,
            right,
            right_width,
            kind,
            condition,
            current: None,
            position: 0,
            matched: false,
            right_matched,
            unmatched_cursor: None,
        }
    }

    fn accepts(&self, row: &[Value]) -> Result<bool> {
        match &self.condition {
            Some(condition) => Ok(is_true(&evaluate(condition, row, &mut [])?)),
            None => Ok(true),
        }
    }

    fn next_unmatched_right(&mut self, mut cursor: usize) -> Option<Frame> {
        while cursor < self.right.len() {
            let index = cursor;
            cursor += 1;
            if !self.right_matched[index] {
                self.unmatched_cursor = Some(cursor);
                let mut row = vec![Value::Null; self.left_width];
                row.extend(self.right[index].iter().cloned());
                return Some(Frame::new(row));
            }
        }
        self.unmatched_cursor = Some(cursor);
        None
    }
}

impl PhysicalOperator for NestedLoopJoinOperator {
    fn next(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(cursor) = self.unmatched_cursor {
                return Ok(self.next_unmatched_right(cursor));
            }

            let Some(left_row) = self.current.take() else {
                match self.left.next()? {
                    Some(frame) => {
                        self.current = Some(frame.values);
                        self.position = 0;
                        self.matched = false;
                    }
                    None if self.kind == JoinKind::RightOuter => {
                        self.unmatched_cursor = Some(0);
                    }
                    None => return Ok(None),
                }
                continue;
            };

            while self.position < self.right.len() {
                let index = self.position;
                self.position += 1;
                let mut row = left_row.clone();
                row.extend(self.right[index].iter().cloned());
                if self.accepts(&row)? {
                    self.matched = true;
                    self.right_matched[index] = true;
                    self.current = Some(left_row);
                    return Ok(Some(Frame::new(row)));
                }
            }

            if self.kind == JoinKind::LeftOuter && !self.matched {
                let mut row = left_row;
                row.resize(self.left_width + self.right_width, Value::Null);
                return Ok(Some(Frame::new(row)));
            }
        }
    }
}
