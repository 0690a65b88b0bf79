use crate::error::Result;

use super::{Executor, Tuple};

/// Reorders and selects child attributes by index.
pub struct ProjectExecutor {
    child: Box<Executor>,
    attr_indexes: Vec<usize>,
}

impl ProjectExecutor {
    pub fn new(child: Executor, attr_indexes: Vec<usize>) -> Self {
        Self {
            child: Box::new(child),
            attr_indexes,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.child.init()
    }

    pub fn next(&mut self) -> Result<Option<Tuple>> {
        let Some(tuple) = self.child.next()? else {
            return Ok(None);
        };
        Ok(Some(
            self.attr_indexes
                .iter()
                .map(|&index| tuple[index].clone())
                .collect(),
        ))
    }

    pub fn close(&mut self) {
        self.child.close();
    }
}
