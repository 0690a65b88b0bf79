use crate::{error::Result, register::Register};

use self::{
    aggregate_executor::AggregateExecutor, filter_executor::FilterExecutor,
    hash_join_executor::HashJoinExecutor, print_executor::PrintExecutor,
    project_executor::ProjectExecutor, set_operation_executor::SetOperationExecutor,
    sort_executor::SortExecutor, vector_scan_executor::VectorScanExecutor,
};

pub mod aggregate_executor;
pub mod filter_executor;
pub mod hash_join_executor;
pub mod print_executor;
pub mod project_executor;
pub mod set_operation_executor;
pub mod sort_executor;
pub mod vector_scan_executor;

/// A tuple is a positional sequence of registers.
pub type Tuple = Vec<Register>;

/// A pull-based physical operator. Parents drive children one tuple at a
/// time through `next`; `init` (re)starts an executor and `close` releases
/// its children and state so that `init` can run it again.
pub enum Executor {
    VectorScan(VectorScanExecutor),
    Print(PrintExecutor),
    Project(ProjectExecutor),
    Filter(FilterExecutor),
    Sort(SortExecutor),
    HashJoin(HashJoinExecutor),
    Aggregate(AggregateExecutor),
    SetOperation(SetOperationExecutor),
}

impl Executor {
    pub fn init(&mut self) -> Result<()> {
        match self {
            Executor::VectorScan(executor) => executor.init(),
            Executor::Print(executor) => executor.init(),
            Executor::Project(executor) => executor.init(),
            Executor::Filter(executor) => executor.init(),
            Executor::Sort(executor) => executor.init(),
            Executor::HashJoin(executor) => executor.init(),
            Executor::Aggregate(executor) => executor.init(),
            Executor::SetOperation(executor) => executor.init(),
        }
    }

    pub fn next(&mut self) -> Result<Option<Tuple>> {
        match self {
            Executor::VectorScan(executor) => executor.next(),
            Executor::Print(executor) => executor.next(),
            Executor::Project(executor) => executor.next(),
            Executor::Filter(executor) => executor.next(),
            Executor::Sort(executor) => executor.next(),
            Executor::HashJoin(executor) => executor.next(),
            Executor::Aggregate(executor) => executor.next(),
            Executor::SetOperation(executor) => executor.next(),
        }
    }

    pub fn close(&mut self) {
        match self {
            Executor::VectorScan(executor) => executor.close(),
            Executor::Print(executor) => executor.close(),
            Executor::Project(executor) => executor.close(),
            Executor::Filter(executor) => executor.close(),
            Executor::Sort(executor) => executor.close(),
            Executor::HashJoin(executor) => executor.close(),
            Executor::Aggregate(executor) => executor.close(),
            Executor::SetOperation(executor) => executor.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        aggregate_executor::{AggregateExecutor, AggregateFunction, Aggregate},
        filter_executor::{Comparison, FilterExecutor, Operand, Predicate},
        hash_join_executor::HashJoinExecutor,
        print_executor::PrintExecutor,
        project_executor::ProjectExecutor,
        set_operation_executor::{SetOperation, SetOperationExecutor},
        sort_executor::{SortCriterion, SortExecutor},
        vector_scan_executor::VectorScanExecutor,
        Executor, Tuple,
    };
    use crate::register::Register;
    use anyhow::Result;
    use std::{
        io::Write,
        sync::{Arc, Mutex},
    };

    fn ints(values: &[i64]) -> Tuple {
        values.iter().map(|&v| Register::from_int(v)).collect()
    }

    fn scan(rows: Vec<Tuple>) -> Executor {
        Executor::VectorScan(VectorScanExecutor::new(rows))
    }

    fn collect(executor: &mut Executor) -> Result<Vec<Tuple>> {
        executor.init()?;
        let mut rows = vec![];
        while let Some(tuple) = executor.next()? {
            rows.push(tuple);
        }
        executor.close();
        Ok(rows)
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_vector_scan_restarts_after_close() -> Result<()> {
        let mut executor = scan(vec![ints(&[1]), ints(&[2])]);
        assert_eq!(collect(&mut executor)?, vec![ints(&[1]), ints(&[2])]);
        assert_eq!(collect(&mut executor)?, vec![ints(&[1]), ints(&[2])]);
        Ok(())
    }

    #[test]
    fn test_print() -> Result<()> {
        let buffer = SharedBuffer::default();
        let rows = vec![
            vec![Register::from_int(1), Register::from_string("foo")],
            vec![Register::from_int(-2), Register::from_string("bar")],
        ];
        let mut executor = Executor::Print(PrintExecutor::new(
            scan(rows),
            Box::new(buffer.clone()),
        ));

        let printed = collect(&mut executor)?;
        // one empty output tuple per printed row
        assert_eq!(printed, vec![Tuple::new(), Tuple::new()]);
        assert_eq!(buffer.contents(), "1,foo\n-2,bar\n");
        Ok(())
    }

    #[test]
    fn test_project_reorders_attributes() -> Result<()> {
        let rows = vec![ints(&[1, 2, 3]), ints(&[4, 5, 6])];
        let mut executor =
            Executor::Project(ProjectExecutor::new(scan(rows), vec![2, 0]));
        assert_eq!(collect(&mut executor)?, vec![ints(&[3, 1]), ints(&[6, 4])]);
        Ok(())
    }

    #[test]
    fn test_filter_against_constant() -> Result<()> {
        let rows = vec![ints(&[1]), ints(&[5]), ints(&[3]), ints(&[7])];
        let mut executor = Executor::Filter(FilterExecutor::new(
            scan(rows),
            Predicate {
                attr_index: 0,
                comparison: Comparison::Gt,
                operand: Operand::Constant(Register::from_int(3)),
            },
        ));
        assert_eq!(collect(&mut executor)?, vec![ints(&[5]), ints(&[7])]);
        Ok(())
    }

    #[test]
    fn test_filter_against_attribute() -> Result<()> {
        let rows = vec![ints(&[1, 2]), ints(&[4, 4]), ints(&[5, 3])];
        let mut executor = Executor::Filter(FilterExecutor::new(
            scan(rows),
            Predicate {
                attr_index: 0,
                comparison: Comparison::Eq,
                operand: Operand::Attribute(1),
            },
        ));
        assert_eq!(collect(&mut executor)?, vec![ints(&[4, 4])]);
        Ok(())
    }

    #[test]
    fn test_filter_on_strings() -> Result<()> {
        let rows = vec![
            vec![Register::from_string("pear")],
            vec![Register::from_string("apple")],
            vec![Register::from_string("fig")],
        ];
        let mut executor = Executor::Filter(FilterExecutor::new(
            scan(rows),
            Predicate {
                attr_index: 0,
                comparison: Comparison::Le,
                operand: Operand::Constant(Register::from_string("fig")),
            },
        ));
        assert_eq!(
            collect(&mut executor)?,
            vec![
                vec![Register::from_string("apple")],
                vec![Register::from_string("fig")]
            ]
        );
        Ok(())
    }

    #[test]
    fn test_sort_criteria_priority() -> Result<()> {
        let rows = vec![
            ints(&[1, 10]),
            ints(&[2, 30]),
            ints(&[1, 20]),
            ints(&[2, 10]),
        ];
        // first criterion most significant, second descending
        let mut executor = Executor::Sort(SortExecutor::new(
            scan(rows),
            vec![
                SortCriterion {
                    attr_index: 0,
                    desc: false,
                },
                SortCriterion {
                    attr_index: 1,
                    desc: true,
                },
            ],
        ));
        assert_eq!(
            collect(&mut executor)?,
            vec![
                ints(&[1, 20]),
                ints(&[1, 10]),
                ints(&[2, 30]),
                ints(&[2, 10]),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_sort_is_a_permutation() -> Result<()> {
        let rows: Vec<Tuple> = [5, 3, 3, 9, 1, 5].iter().map(|&v| ints(&[v])).collect();
        let mut executor = Executor::Sort(SortExecutor::new(
            scan(rows.clone()),
            vec![SortCriterion {
                attr_index: 0,
                desc: false,
            }],
        ));
        let mut output = collect(&mut executor)?;
        assert!(output
            .windows(2)
            .all(|pair| pair[0][0].as_int() <= pair[1][0].as_int()));
        let mut input = rows;
        input.sort();
        output.sort();
        assert_eq!(output, input);
        Ok(())
    }

    #[test]
    fn test_hash_join() -> Result<()> {
        let left = vec![
            vec![Register::from_int(1), Register::from_string("a")],
            vec![Register::from_int(2), Register::from_string("b")],
        ];
        let right = vec![
            vec![Register::from_int(2), Register::from_string("x")],
            vec![Register::from_int(3), Register::from_string("y")],
        ];
        let mut executor =
            Executor::HashJoin(HashJoinExecutor::new(scan(left), scan(right), 0, 0));
        assert_eq!(
            collect(&mut executor)?,
            vec![vec![
                Register::from_int(2),
                Register::from_string("b"),
                Register::from_int(2),
                Register::from_string("x"),
            ]]
        );
        // the build side rebuilds cleanly after close
        assert_eq!(collect(&mut executor)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_aggregate_sum_and_count() -> Result<()> {
        let rows = vec![ints(&[1, 10]), ints(&[1, 20]), ints(&[2, 5])];
        let mut executor = Executor::Aggregate(AggregateExecutor::new(
            scan(rows),
            vec![0],
            vec![
                Aggregate {
                    function: AggregateFunction::Sum,
                    attr_index: 1,
                },
                Aggregate {
                    function: AggregateFunction::Count,
                    attr_index: 1,
                },
            ],
        ));
        let mut output = collect(&mut executor)?;
        output.sort();
        assert_eq!(output, vec![ints(&[1, 30, 2]), ints(&[2, 5, 1])]);
        Ok(())
    }

    #[test]
    fn test_aggregate_min_max() -> Result<()> {
        let rows = vec![ints(&[7]), ints(&[-4]), ints(&[12])];
        let mut executor = Executor::Aggregate(AggregateExecutor::new(
            scan(rows),
            vec![],
            vec![
                Aggregate {
                    function: AggregateFunction::Min,
                    attr_index: 0,
                },
                Aggregate {
                    function: AggregateFunction::Max,
                    attr_index: 0,
                },
            ],
        ));
        assert_eq!(collect(&mut executor)?, vec![ints(&[-4, 12])]);
        Ok(())
    }

    fn set_operation(operation: SetOperation, left: &[i64], right: &[i64]) -> Executor {
        let left: Vec<Tuple> = left.iter().map(|&v| ints(&[v])).collect();
        let right: Vec<Tuple> = right.iter().map(|&v| ints(&[v])).collect();
        Executor::SetOperation(SetOperationExecutor::new(operation, scan(left), scan(right)))
    }

    fn sorted_values(rows: Vec<Tuple>) -> Vec<i64> {
        let mut values: Vec<i64> = rows.iter().map(|t| t[0].as_int()).collect();
        values.sort_unstable();
        values
    }

    #[test]
    fn test_union_deduplicates() -> Result<()> {
        let mut executor = set_operation(SetOperation::Union, &[1, 1, 2, 3], &[1, 2, 2, 4]);
        assert_eq!(sorted_values(collect(&mut executor)?), vec![1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn test_union_all_keeps_multiplicities() -> Result<()> {
        let mut executor = set_operation(SetOperation::UnionAll, &[1, 1, 2], &[2, 4]);
        assert_eq!(
            collect(&mut executor)?,
            vec![ints(&[1]), ints(&[1]), ints(&[2]), ints(&[2]), ints(&[4])]
        );
        Ok(())
    }

    #[test]
    fn test_intersect() -> Result<()> {
        let mut executor = set_operation(SetOperation::Intersect, &[1, 1, 2, 3], &[1, 1, 2, 4]);
        assert_eq!(sorted_values(collect(&mut executor)?), vec![1, 2]);
        Ok(())
    }

    #[test]
    fn test_intersect_all_takes_minimum_multiplicity() -> Result<()> {
        let mut executor =
            set_operation(SetOperation::IntersectAll, &[1, 1, 2], &[1, 1, 1, 2, 2]);
        assert_eq!(sorted_values(collect(&mut executor)?), vec![1, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_except() -> Result<()> {
        let mut executor = set_operation(SetOperation::Except, &[1, 1, 2, 3], &[1, 4]);
        assert_eq!(sorted_values(collect(&mut executor)?), vec![2, 3]);
        Ok(())
    }

    #[test]
    fn test_except_all_subtracts_multiplicities() -> Result<()> {
        let mut executor =
            set_operation(SetOperation::ExceptAll, &[1, 1, 1, 2, 3], &[1, 2, 2]);
        assert_eq!(sorted_values(collect(&mut executor)?), vec![1, 1, 3]);
        Ok(())
    }

    #[test]
    fn test_pipeline_composition() -> Result<()> {
        // filter rows, project the name forward, then sort it
        let rows = vec![
            vec![Register::from_int(3), Register::from_string("carol")],
            vec![Register::from_int(1), Register::from_string("alice")],
            vec![Register::from_int(4), Register::from_string("dave")],
            vec![Register::from_int(2), Register::from_string("bob")],
        ];
        let filter = Executor::Filter(FilterExecutor::new(
            scan(rows),
            Predicate {
                attr_index: 0,
                comparison: Comparison::Ge,
                operand: Operand::Constant(Register::from_int(2)),
            },
        ));
        let project = Executor::Project(ProjectExecutor::new(filter, vec![1]));
        let mut sort = Executor::Sort(SortExecutor::new(
            project,
            vec![SortCriterion {
                attr_index: 0,
                desc: false,
            }],
        ));
        assert_eq!(
            collect(&mut sort)?,
            vec![
                vec![Register::from_string("bob")],
                vec![Register::from_string("carol")],
                vec![Register::from_string("dave")],
            ]
        );
        Ok(())
    }
}
