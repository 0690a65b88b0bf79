use std::io::Write;

use crate::error::Result;

use super::{Executor, Tuple};

/// Writes each child tuple to the sink as comma-separated fields followed
/// by a newline. Integers print in decimal, strings raw. The executor
/// itself produces empty tuples; the sink is its output.
pub struct PrintExecutor {
    child: Box<Executor>,
    out: Box<dyn Write>,
}

impl PrintExecutor {
    pub fn new(child: Executor, out: Box<dyn Write>) -> Self {
        Self {
            child: Box::new(child),
            out,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.child.init()
    }

    pub fn next(&mut self) -> Result<Option<Tuple>> {
        let Some(tuple) = self.child.next()? else {
            return Ok(None);
        };
        for (i, register) in tuple.iter().enumerate() {
            if i > 0 {
                write!(self.out, ",")?;
            }
            write!(self.out, "{}", register)?;
        }
        writeln!(self.out)?;
        Ok(Some(vec![]))
    }

    pub fn close(&mut self) {
        self.child.close();
    }
}
