// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Condition program compiler
//!
//! Each [`CompiledCondition`] compiles once into a [`ConditionProgram`]: the
//! type handler is resolved, null checks on non-nullable columns are folded
//! to constants, and a direct executor closure is selected. At call time the
//! program only decodes its arguments and runs.

use std::fmt;
use std::sync::Arc;

use crate::core::{Combinator, Operator, Result, RowRef, TypeCode, Value};
use crate::executor::decoders::{self, ConditionValue};
use crate::executor::handlers::{TypeHandler, TypeHandlerRegistry};
use crate::executor::predicate::ColumnPredicate;
use crate::storage::{GeneratedTable, Selection};

/// Declarative condition over one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledCondition {
    /// Column position
    pub column: usize,
    /// Logical type of the column
    pub type_code: TypeCode,
    pub operator: Operator,
    /// First argument consumed (BETWEEN also reads the next one)
    pub arg_index: usize,
    pub ignore_case: bool,
    /// Link to the next condition in the flat list
    pub next: Combinator,
}

impl CompiledCondition {
    pub fn new(column: usize, type_code: TypeCode, operator: Operator, arg_index: usize) -> Self {
        Self {
            column,
            type_code,
            operator,
            arg_index,
            ignore_case: false,
            next: Combinator::And,
        }
    }

    /// Builder method to compare case-insensitively
    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    /// Builder method to link the next condition with OR
    pub fn or(mut self) -> Self {
        self.next = Combinator::Or;
        self
    }
}

impl fmt::Display for CompiledCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "col{} {} ${}", self.column, self.operator, self.arg_index)?;
        if self.ignore_case {
            f.write_str(" (ignore case)")?;
        }
        Ok(())
    }
}

/// Split a flat condition list into its OR-separated AND-groups
///
/// Returns index ranges into `conditions`; an empty list yields no group.
pub fn split_groups(conditions: &[CompiledCondition]) -> Vec<std::ops::Range<usize>> {
    let mut groups = Vec::new();
    let mut start = 0;
    for (i, condition) in conditions.iter().enumerate() {
        if condition.next == Combinator::Or {
            groups.push(start..i + 1);
            start = i + 1;
        }
    }
    if start < conditions.len() {
        groups.push(start..conditions.len());
    }
    groups
}

/// Scan closure selected at compile time
pub type DirectExecutor =
    Arc<dyn Fn(&dyn GeneratedTable, &[Value]) -> Result<Selection> + Send + Sync>;

/// A condition ready to run
#[derive(Clone)]
pub struct ConditionProgram {
    condition: CompiledCondition,
    handler: Arc<dyn TypeHandler>,
    nullable: bool,
    executor: DirectExecutor,
}

impl ConditionProgram {
    /// Resolve the handler and select the executor variant
    pub fn compile(
        condition: CompiledCondition,
        registry: &TypeHandlerRegistry,
        nullable: bool,
    ) -> Result<Self> {
        let handler = Arc::clone(registry.for_type(condition.type_code)?);
        let executor: DirectExecutor = match (nullable, condition.operator) {
            (false, Operator::IsNull) => {
                Arc::new(|_: &dyn GeneratedTable, _: &[Value]| Ok(Selection::empty()))
            }
            (false, Operator::NotNull) => {
                Arc::new(|table: &dyn GeneratedTable, _: &[Value]| Ok(Selection::all(table)))
            }
            _ => {
                let handler = Arc::clone(&handler);
                let condition = condition.clone();
                Arc::new(move |table: &dyn GeneratedTable, args: &[Value]| {
                    let value = decoders::decode(
                        condition.operator,
                        condition.type_code,
                        args,
                        condition.arg_index,
                    )?;
                    handler.execute_condition(
                        table,
                        condition.column,
                        condition.operator,
                        &value,
                        condition.ignore_case,
                    )
                })
            }
        };
        Ok(Self {
            condition,
            handler,
            nullable,
            executor,
        })
    }

    pub fn condition(&self) -> &CompiledCondition {
        &self.condition
    }

    pub fn handler(&self) -> &Arc<dyn TypeHandler> {
        &self.handler
    }

    /// Decode this condition's arguments
    pub fn decode(&self, args: &[Value]) -> Result<ConditionValue> {
        decoders::decode(
            self.condition.operator,
            self.condition.type_code,
            args,
            self.condition.arg_index,
        )
    }

    /// Full scan through the direct executor
    pub fn execute(&self, table: &dyn GeneratedTable, args: &[Value]) -> Result<Selection> {
        (self.executor)(table, args)
    }

    /// Predicate bound to `args`
    pub fn predicate(&self, args: &[Value]) -> Result<ColumnPredicate> {
        match (self.nullable, self.condition.operator) {
            (false, Operator::IsNull) => Ok(ColumnPredicate::False),
            (false, Operator::NotNull) => Ok(ColumnPredicate::True),
            (_, op) => self.handler.predicate(
                self.condition.column,
                op,
                &self.decode(args)?,
                self.condition.ignore_case,
            ),
        }
    }

    /// Single-row evaluator bound to `args`
    pub fn row_evaluator(&self, args: &[Value]) -> Result<RowEvaluator> {
        Ok(RowEvaluator {
            predicate: self.predicate(args)?,
        })
    }
}

impl fmt::Debug for ConditionProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionProgram")
            .field("condition", &self.condition)
            .field("nullable", &self.nullable)
            .finish()
    }
}

/// Tests single rows against one condition
#[derive(Debug, Clone)]
pub struct RowEvaluator {
    predicate: ColumnPredicate,
}

impl RowEvaluator {
    /// Test a row; the caller holds the seqlock read
    #[inline]
    pub fn matches(&self, table: &dyn GeneratedTable, row: u32) -> bool {
        self.predicate.matches(table, row)
    }

    pub fn predicate(&self) -> &ColumnPredicate {
        &self.predicate
    }

    /// Returns true if no row can satisfy the condition
    pub fn is_unsatisfiable(&self) -> bool {
        self.predicate.is_false()
    }
}

/// Test `row` against every evaluator in one consistent read
///
/// Liveness is re-checked inside the read, so a row tombstoned after the
/// candidates were collected never passes.
pub fn matches_all(table: &dyn GeneratedTable, row: RowRef, evaluators: &[RowEvaluator]) -> bool {
    let mut accepted = false;
    table.read_with_seqlock(row.index(), &mut || {
        accepted = table.is_live(row) && evaluators.iter().all(|e| e.matches(table, row.index()));
    });
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SchemaBuilder;
    use crate::storage::{ColumnarTable, TableConfig};

    fn setup_table() -> ColumnarTable {
        let schema = SchemaBuilder::new("Person")
            .add_id("id", TypeCode::Long)
            .add("age", TypeCode::Int)
            .add_nullable("name", TypeCode::String)
            .build()
            .unwrap();
        let table = ColumnarTable::new(schema, TableConfig::new());
        for (id, age, name) in [(1, 20, Some("ann")), (2, 30, None), (3, 40, Some("cy"))] {
            table
                .insert_from(&[Value::Long(id), Value::Int(age), name.into()])
                .unwrap();
        }
        table
    }

    #[test]
    fn test_split_groups() {
        let c = |op| CompiledCondition::new(1, TypeCode::Int, op, 0);
        let conditions = vec![c(Operator::Eq), c(Operator::Gt).or(), c(Operator::Lt), c(Operator::Eq)];
        assert_eq!(split_groups(&conditions), vec![0..2, 2..4]);
        assert!(split_groups(&[]).is_empty());
        assert_eq!(split_groups(&[c(Operator::Eq).or()]), vec![0..1]);
    }

    #[test]
    fn test_execute_and_evaluate_agree() {
        let table = setup_table();
        let registry = TypeHandlerRegistry::with_defaults();
        let program = ConditionProgram::compile(
            CompiledCondition::new(1, TypeCode::Int, Operator::Gte, 0),
            &registry,
            false,
        )
        .unwrap();
        let args = [Value::Int(30)];
        let selection = program.execute(&table, &args).unwrap();
        assert_eq!(selection.to_row_indices(), vec![1, 2]);

        let evaluator = program.row_evaluator(&args).unwrap();
        let matched: Vec<RowRef> = Selection::all(&table)
            .iter()
            .filter(|r| matches_all(&table, *r, std::slice::from_ref(&evaluator)))
            .collect();
        assert_eq!(matched, selection.into_refs());
    }

    #[test]
    fn test_non_nullable_null_checks_fold() {
        let table = setup_table();
        let registry = TypeHandlerRegistry::with_defaults();
        let is_null = ConditionProgram::compile(
            CompiledCondition::new(1, TypeCode::Int, Operator::IsNull, 0),
            &registry,
            false,
        )
        .unwrap();
        assert!(is_null.execute(&table, &[]).unwrap().is_empty());
        assert!(is_null.row_evaluator(&[]).unwrap().is_unsatisfiable());

        let not_null = ConditionProgram::compile(
            CompiledCondition::new(2, TypeCode::String, Operator::NotNull, 0),
            &registry,
            true,
        )
        .unwrap();
        assert_eq!(not_null.execute(&table, &[]).unwrap().to_row_indices(), vec![0, 2]);
    }

    #[test]
    fn test_missing_handler_at_compile() {
        let registry = TypeHandlerRegistry::empty();
        let err = ConditionProgram::compile(
            CompiledCondition::new(1, TypeCode::Int, Operator::Eq, 0),
            &registry,
            false,
        )
        .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_stale_row_rejected() {
        let table = setup_table();
        let row = table.lookup_by_id(2).unwrap();
        let registry = TypeHandlerRegistry::with_defaults();
        let program = ConditionProgram::compile(
            CompiledCondition::new(1, TypeCode::Int, Operator::Gt, 0),
            &registry,
            false,
        )
        .unwrap();
        let evaluator = program.row_evaluator(&[Value::Int(0)]).unwrap();
        assert!(matches_all(&table, row, std::slice::from_ref(&evaluator)));
        table.tombstone(row);
        assert!(!matches_all(&table, row, std::slice::from_ref(&evaluator)));
    }
}
