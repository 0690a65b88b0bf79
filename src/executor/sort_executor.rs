use crate::error::Result;

use super::{Executor, Tuple};

#[derive(Debug, Clone, Copy)]
pub struct SortCriterion {
    pub attr_index: usize,
    pub desc: bool,
}

/// Materializes the child and sorts it by the given criteria, first
/// criterion most significant. Applying the criteria in reverse order with
/// a stable sort yields exactly that priority.
pub struct SortExecutor {
    child: Box<Executor>,
    criteria: Vec<SortCriterion>,
    result: Vec<Tuple>,
    cursor: usize,
}

impl SortExecutor {
    pub fn new(child: Executor, criteria: Vec<SortCriterion>) -> Self {
        Self {
            child: Box::new(child),
            criteria,
            result: vec![],
            cursor: 0,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.result.clear();
        self.cursor = 0;
        while let Some(tuple) = self.child.next()? {
            self.result.push(tuple);
        }
        for criterion in self.criteria.iter().rev() {
            self.result.sort_by(|a, b| {
                let ordering = a[criterion.attr_index].cmp(&b[criterion.attr_index]);
                if criterion.desc {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
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
