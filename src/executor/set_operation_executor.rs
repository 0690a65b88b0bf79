use std::collections::HashMap;

use crate::error::Result;

use super::{Executor, Tuple};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperation {
    /// Every distinct tuple appearing in either input, once.
    Union,
    /// Every left tuple, then every right tuple, with multiplicity.
    UnionAll,
    /// Every tuple present on both sides, once.
    Intersect,
    /// Each tuple `min(left multiplicity, right multiplicity)` times.
    IntersectAll,
    /// Every distinct left tuple absent from the right.
    Except,
    /// Each tuple `max(0, left multiplicity - right multiplicity)` times.
    ExceptAll,
}

/// Hash-based set and multiset operations over two identically-shaped
/// inputs. The union and intersection variants stream; the except variants
/// consume both inputs up front and drain the surviving multiplicities.
pub struct SetOperationExecutor {
    operation: SetOperation,
    left: Box<Executor>,
    right: Box<Executor>,
    counters: HashMap<Tuple, i64>,
    remaining: Vec<(Tuple, i64)>,
    drain_index: usize,
    left_done: bool,
}

impl SetOperationExecutor {
    pub fn new(operation: SetOperation, left: Executor, right: Executor) -> Self {
        Self {
            operation,
            left: Box::new(left),
            right: Box::new(right),
            counters: HashMap::new(),
            remaining: vec![],
            drain_index: 0,
            left_done: false,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.left.init()?;
        self.right.init()?;
        self.counters.clear();
        self.remaining.clear();
        self.drain_index = 0;
        self.left_done = false;

        match self.operation {
            SetOperation::Union | SetOperation::UnionAll => {}
            SetOperation::Intersect => {
                while let Some(tuple) = self.left.next()? {
                    self.counters.insert(tuple, 1);
                }
            }
            SetOperation::IntersectAll => {
                while let Some(tuple) = self.left.next()? {
                    *self.counters.entry(tuple).or_insert(0) += 1;
                }
            }
            SetOperation::Except | SetOperation::ExceptAll => {
                while let Some(tuple) = self.left.next()? {
                    match self.operation {
                        SetOperation::Except => {
                            self.counters.insert(tuple, 1);
                        }
                        _ => *self.counters.entry(tuple).or_insert(0) += 1,
                    }
                }
                while let Some(tuple) = self.right.next()? {
                    if let Some(count) = self.counters.get_mut(&tuple) {
                        if *count > 0 {
                            *count -= 1;
                        }
                    }
                }
                self.remaining = self.counters.drain().collect();
            }
        }
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<Tuple>> {
        match self.operation {
            SetOperation::UnionAll => {
                if !self.left_done {
                    if let Some(tuple) = self.left.next()? {
                        return Ok(Some(tuple));
                    }
                    self.left_done = true;
                }
                self.right.next()
            }
            SetOperation::Union => {
                if !self.left_done {
                    while let Some(tuple) = self.left.next()? {
                        if self.counters.insert(tuple.clone(), 1).is_none() {
                            return Ok(Some(tuple));
                        }
                    }
                    self.left_done = true;
                }
                while let Some(tuple) = self.right.next()? {
                    if self.counters.insert(tuple.clone(), 1).is_none() {
                        return Ok(Some(tuple));
                    }
                }
                Ok(None)
            }
            SetOperation::Intersect | SetOperation::IntersectAll => {
                while let Some(tuple) = self.right.next()? {
                    if let Some(count) = self.counters.get_mut(&tuple) {
                        if *count > 0 {
                            *count -= 1;
                            return Ok(Some(tuple));
                        }
                    }
                }
                Ok(None)
            }
            SetOperation::Except | SetOperation::ExceptAll => {
                while self.drain_index < self.remaining.len() {
                    let (tuple, count) = &mut self.remaining[self.drain_index];
                    if *count > 0 {
                        *count -= 1;
                        return Ok(Some(tuple.clone()));
                    }
                    self.drain_index += 1;
                }
                Ok(None)
            }
        }
    }

    pub fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.counters.clear();
        self.remaining.clear();
        self.drain_index = 0;
        self.left_done = false;
    }
}
