//! Result shaping after projection: DISTINCT, ORDER BY and skip/take.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::error::Result;
use crate::executor::{Frame, PhysicalOperator};
use crate::types::Value;

/// Drops frames whose projected values were already emitted.
pub struct DistinctOperator {
    child: Box<dyn PhysicalOperator>,
    seen: HashSet<Vec<Value>>,
}

impl DistinctOperator {
    #[must_use]
    pub fn new(child: Box<dyn PhysicalOperator>) -> Self {
        DistinctOperator {
            child,
            seen: HashSet::new(),
        }
    }
}

impl PhysicalOperator for DistinctOperator {
    fn next(&mut self) -> Result<Option<Frame>> {
        while let Some(frame) = self.child.next()? {
            if self.seen.insert(frame.values.clone()) {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }
}

/// Stable sort on the frames' ORDER BY keys.
///
/// Nulls sort first in ascending order and last in descending order.
pub struct SortOperator {
    child: Box<dyn PhysicalOperator>,
    ascending: Vec<bool>,
    sorted: Option<std::vec::IntoIter<Frame>>,
}

impl SortOperator {
    #[must_use]
    pub fn new(child: Box<dyn PhysicalOperator>, ascending: Vec<bool>) -> Self {
        SortOperator {
            child,
            ascending,
            sorted: None,
        }
    }

    fn compare(&self, a: &Frame, b: &Frame) -> Ordering {
        let keys = a.sort_keys.iter().zip(&b.sort_keys).zip(&self.ascending);
        for ((left, right), ascending) in keys {
            let ord = left.sort_cmp(right);
            let ord = if *ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PhysicalOperator for SortOperator {
    fn next(&mut self) -> Result<Option<Frame>> {
        if self.sorted.is_none() {
            let mut frames = Vec::new();
            while let Some(frame) = self.child.next()? {
                frames.push(frame);
            }
            frames.sort_by(|a, b| self.compare(a, b));
            self.sorted = Some(frames.into_iter());
        }
        Ok(self.sorted.as_mut().and_then(Iterator::next))
    }
}

/// Applies skip, then take.
pub struct LimitOperator {
    child: Box<dyn PhysicalOperator>,
    skip: u64,
    take: Option<u64>,
    emitted: u64,
}

impl LimitOperator {
    #[must_use]
    pub fn new(child: Box<dyn PhysicalOperator>, skip: Option<u64>, take: Option<u64>) -> Self {
        LimitOperator {
            child,
            skip: skip.unwrap_or(0),
            take,
            emitted: 0,
        }
    }
}

impl PhysicalOperator for LimitOperator {
    fn next(&mut self) -> Result<Option<Frame>> {
        if self.take.is_some_and(|take| self.emitted >= take) {
            return Ok(None);
        }
        while self.skip > 0 {
            if self.child.next()?.is_none() {
                return Ok(None);
            }
            self.skip -= 1;
        }
        let frame = self.child.next()?;
        if frame.is_some() {
            self.emitted += 1;
        }
        Ok(frame)
    }
}
