use std::collections::HashMap;

use crate::{error::Result, register::Register};

use super::{Executor, Tuple};

/// An equi-join that builds a hash table over the left input and probes it
/// with the right. Build keys are assumed unique; a matching right tuple
/// emits the left tuple followed by the right one.
pub struct HashJoinExecutor {
    left: Box<Executor>,
    right: Box<Executor>,
    left_attr_index: usize,
    right_attr_index: usize,
    table: HashMap<Register, Tuple>,
}

impl HashJoinExecutor {
    pub fn new(
        left: Executor,
        right: Executor,
        left_attr_index: usize,
        right_attr_index: usize,
    ) -> Self {
        Self {
            left: Box::new(left),
            right: Box::new(right),
            left_attr_index,
            right_attr_index,
            table: HashMap::new(),
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.left.init()?;
        self.right.init()?;
        self.table.clear();
        while let Some(tuple) = self.left.next()? {
            let key = tuple[self.left_attr_index].clone();
            self.table.entry(key).or_insert(tuple);
        }
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<Tuple>> {
        while let Some(tuple) = self.right.next()? {
            if let Some(matched) = self.table.get(&tuple[self.right_attr_index]) {
                let mut output = matched.clone();
                output.extend(tuple);
                return Ok(Some(output));
            }
        }
        Ok(None)
    }

    pub fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.table.clear();
    }
}
