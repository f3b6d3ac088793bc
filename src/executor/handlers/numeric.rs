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

//! Handler for integral, boolean, char and temporal columns

use crate::core::{Operator, Result, StorageKind, TypeCode};
use crate::executor::decoders::ConditionValue;
use crate::executor::handlers::{ordered_predicate, unsupported, TypeHandler};
use crate::executor::predicate::ColumnPredicate;

/// Int- and long-backed types compared by their stored integer
///
/// BOOLEAN columns answer EQ, IN, IS_TRUE and IS_FALSE but not ordering.
#[derive(Debug, Clone, Copy)]
pub struct NumericHandler {
    code: TypeCode,
}

impl NumericHandler {
    pub fn new(code: TypeCode) -> Self {
        Self { code }
    }

    fn bounds(&self) -> (i64, i64) {
        match self.code.storage_kind() {
            StorageKind::Int => (i32::MIN as i64, i32::MAX as i64),
            _ => (i64::MIN, i64::MAX),
        }
    }
}

impl TypeHandler for NumericHandler {
    fn type_code(&self) -> TypeCode {
        self.code
    }

    fn positive_predicate(
        &self,
        column: usize,
        op: Operator,
        value: &ConditionValue,
        _ignore_case: bool,
    ) -> Result<ColumnPredicate> {
        let kind = self.code.storage_kind();
        if self.code == TypeCode::Boolean {
            return match op {
                Operator::IsTrue => Ok(ColumnPredicate::range(column, kind, 1, 1)),
                Operator::IsFalse => Ok(ColumnPredicate::range(column, kind, 0, 0)),
                Operator::Eq | Operator::In | Operator::IsNull => {
                    ordered_predicate(self, column, op, value, 0, 1)
                }
                other => Err(unsupported(other, self.code)),
            };
        }
        let (floor, ceiling) = self.bounds();
        ordered_predicate(self, column, op, value, floor, ceiling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SchemaBuilder, Value};
    use crate::storage::{ColumnarTable, GeneratedTable, TableConfig};

    fn setup_table() -> ColumnarTable {
        let schema = SchemaBuilder::new("Person")
            .add_id("id", TypeCode::Long)
            .add("age", TypeCode::Int)
            .add("active", TypeCode::Boolean)
            .build()
            .unwrap();
        let table = ColumnarTable::new(schema, TableConfig::new());
        for (id, age, active) in [(1, 20, true), (2, 30, false), (3, 40, true)] {
            table
                .insert_from(&[Value::Long(id), Value::Int(age), Value::Boolean(active)])
                .unwrap();
        }
        table
    }

    fn run(table: &ColumnarTable, code: TypeCode, column: usize, op: Operator, value: ConditionValue) -> Vec<u32> {
        NumericHandler::new(code)
            .execute_condition(table, column, op, &value, false)
            .unwrap()
            .to_row_indices()
    }

    #[test]
    fn test_comparisons() {
        let table = setup_table();
        let thirty = || ConditionValue::Scalar(Value::Int(30));
        assert_eq!(run(&table, TypeCode::Int, 1, Operator::Eq, thirty()), vec![1]);
        assert_eq!(run(&table, TypeCode::Int, 1, Operator::Ne, thirty()), vec![0, 2]);
        assert_eq!(run(&table, TypeCode::Int, 1, Operator::Gt, thirty()), vec![2]);
        assert_eq!(run(&table, TypeCode::Int, 1, Operator::Gte, thirty()), vec![1, 2]);
        assert_eq!(run(&table, TypeCode::Int, 1, Operator::Lt, thirty()), vec![0]);
        assert_eq!(run(&table, TypeCode::Int, 1, Operator::Lte, thirty()), vec![0, 1]);
        let between = ConditionValue::Range(Value::Int(25), Value::Long(45));
        assert_eq!(run(&table, TypeCode::Int, 1, Operator::Between, between), vec![1, 2]);
    }

    #[test]
    fn test_in_and_not_in() {
        let table = setup_table();
        let list = || ConditionValue::List(vec![Value::Int(20), Value::Int(40)]);
        assert_eq!(run(&table, TypeCode::Int, 1, Operator::In, list()), vec![0, 2]);
        assert_eq!(run(&table, TypeCode::Int, 1, Operator::NotIn, list()), vec![1]);
        let empty = ConditionValue::List(vec![]);
        assert!(run(&table, TypeCode::Int, 1, Operator::In, empty.clone()).is_empty());
        assert_eq!(run(&table, TypeCode::Int, 1, Operator::NotIn, empty), vec![0, 1, 2]);
    }

    #[test]
    fn test_boolean_operators() {
        let table = setup_table();
        assert_eq!(run(&table, TypeCode::Boolean, 2, Operator::IsTrue, ConditionValue::None), vec![0, 2]);
        assert_eq!(run(&table, TypeCode::Boolean, 2, Operator::IsFalse, ConditionValue::None), vec![1]);
        // any nonzero number is true
        let one = ConditionValue::Scalar(Value::Int(7));
        assert_eq!(run(&table, TypeCode::Boolean, 2, Operator::Eq, one), vec![0, 2]);

        let err = NumericHandler::new(TypeCode::Boolean)
            .execute_condition(&table, 2, Operator::Gt, &ConditionValue::Scalar(Value::Int(0)), false)
            .unwrap_err();
        assert!(err.is_not_supported());
    }

    #[test]
    fn test_unsupported_and_null() {
        let table = setup_table();
        let handler = NumericHandler::new(TypeCode::Int);
        let err = handler
            .execute_condition(&table, 1, Operator::StartingWith, &ConditionValue::Scalar(Value::Int(1)), false)
            .unwrap_err();
        assert!(err.is_not_supported());
        assert!(run(&table, TypeCode::Int, 1, Operator::Eq, ConditionValue::Scalar(Value::Null)).is_empty());
        assert!(run(&table, TypeCode::Int, 1, Operator::IsNull, ConditionValue::None).is_empty());
        assert_eq!(table.live_count(), 3);
    }

    #[test]
    fn test_conversion_error() {
        let table = setup_table();
        let err = NumericHandler::new(TypeCode::Int)
            .execute_condition(&table, 1, Operator::Eq, &ConditionValue::Scalar(Value::text("x")), false)
            .unwrap_err();
        assert!(matches!(err, crate::core::Error::TypeConversion { .. }));
    }
}
