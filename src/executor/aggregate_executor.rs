use std::collections::HashMap;

use crate::{error::Result, register::Register};

use super::{Executor, Tuple};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Min,
    Max,
    Sum,
    Count,
}

#[derive(Debug, Clone, Copy)]
pub struct Aggregate {
    pub function: AggregateFunction,
    /// The attribute the function runs over. Ignored by `Count`.
    pub attr_index: usize,
}

/// Hash aggregation: groups the input by the given attributes and keeps one
/// vector of running aggregates per group. Emits `group keys ++ aggregate
/// values` per group, in no particular order.
pub struct AggregateExecutor {
    child: Box<Executor>,
    group_by: Vec<usize>,
    aggregates: Vec<Aggregate>,
    result: Vec<Tuple>,
    cursor: usize,
}

impl AggregateExecutor {
    pub fn new(child: Executor, group_by: Vec<usize>, aggregates: Vec<Aggregate>) -> Self {
        Self {
            child: Box::new(child),
            group_by,
            aggregates,
            result: vec![],
            cursor: 0,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.result.clear();
        self.cursor = 0;

        let mut groups: HashMap<Tuple, Vec<Register>> = HashMap::new();
        while let Some(tuple) = self.child.next()? {
            let keys: Tuple = self
                .group_by
                .iter()
                .map(|&index| tuple[index].clone())
                .collect();
            let running = groups.entry(keys).or_insert_with(|| {
                self.aggregates
                    .iter()
                    .map(|spec| match spec.function {
                        // min and max start from the first seen value
                        AggregateFunction::Min | AggregateFunction::Max => {
                            tuple[spec.attr_index].clone()
                        }
                        AggregateFunction::Sum | AggregateFunction::Count => Register::from_int(0),
                    })
                    .collect()
            });
            for (i, spec) in self.aggregates.iter().enumerate() {
                match spec.function {
                    AggregateFunction::Min => {
                        if tuple[spec.attr_index] < running[i] {
                            running[i] = tuple[spec.attr_index].clone();
                        }
                    }
                    AggregateFunction::Max => {
                        if tuple[spec.attr_index] > running[i] {
                            running[i] = tuple[spec.attr_index].clone();
                        }
                    }
                    AggregateFunction::Sum => {
                        running[i] =
                            Register::from_int(running[i].as_int() + tuple[spec.attr_index].as_int());
                    }
                    AggregateFunction::Count => {
                        running[i] = Register::from_int(running[i].as_int() + 1);
                    }
                }
            }
        }

        for (keys, aggregates) in groups {
            let mut tuple = keys;
            tuple.extend(aggregates);
            self.result.push(tuple);
        }
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<Tuple>> {
        if self.cursor < self.result.len() {
            let tuple = self.result[self.cursor].clone();
            self.cursor += 1;
            return Ok(Some(tuple));
        }
        Ok(None)
    }

    pub fn close(&mut self) {
        self.child.close();
        self.result.clear();
        self.cursor = 0;
    }
}
