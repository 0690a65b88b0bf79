use crate::error::Result;

use super::Tuple;

/// A scan over an in-memory vector of tuples, the source operator used to
/// feed pipelines that do not read from disk.
pub struct VectorScanExecutor {
    rows: Vec<Tuple>,
    cursor: usize,
}

impl VectorScanExecutor {
    pub fn new(rows: Vec<Tuple>) -> Self {
        Self { rows, cursor: 0 }
    }

    pub fn init(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<Tuple>> {
        if self.cursor < self.rows.len() {
            let tuple = self.rows[self.cursor].clone();
            self.cursor += 1;
            return Ok(Some(tuple));
        }
        Ok(None)
    }

    pub fn close(&mut self) {
        self.cursor = 0;
    }
}
