use crate::{error::Result, register::Register};

use super::{Executor, Tuple};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// The right-hand side of a predicate: a constant or another attribute of
/// the same tuple.
#[derive(Debug, Clone)]
pub enum Operand {
    Constant(Register),
    Attribute(usize),
}

#[derive(Debug, Clone)]
pub struct Predicate {
    pub attr_index: usize,
    pub comparison: Comparison,
    pub operand: Operand,
}

impl Predicate {
    fn matches(&self, tuple: &Tuple) -> bool {
        let left = &tuple[self.attr_index];
        let right = match &self.operand {
            Operand::Constant(register) => register,
            Operand::Attribute(index) => &tuple[*index],
        };
        match self.comparison {
            Comparison::Eq => left == right,
            Comparison::Ne => left != right,
            Comparison::Lt => left < right,
            Comparison::Le => left <= right,
            Comparison::Gt => left > right,
            Comparison::Ge => left >= right,
        }
    }
}

/// Forwards the child tuples for which the predicate holds.
pub struct FilterExecutor {
    child: Box<Executor>,
    predicate: Predicate,
}

impl FilterExecutor {
    pub fn new(child: Executor, predicate: Predicate) -> Self {
        Self {
            child: Box::new(child),
            predicate,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.child.init()
    }

    pub fn next(&mut self) -> Result<Option<Tuple>> {
        while let Some(tuple) = self.child.next()? {
            if self.predicate.matches(&tuple) {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    pub fn close(&mut self) {
        self.child.close();
    }
}
