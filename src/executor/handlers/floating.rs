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

//! Handler for FLOAT and DOUBLE columns
//!
//! Values are stored with the sortable bit encoding, so ordering reduces to
//! integer ranges. Open-ended ranges stop at the infinities, which keeps NaN
//! out of every comparison; IS_NAN reaches it explicitly.

use crate::common::float_encoding::{double_to_sortable_long, float_to_sortable_int};
use crate::core::{Operator, Result, TypeCode};
use crate::executor::decoders::ConditionValue;
use crate::executor::handlers::{ordered_predicate, TypeHandler};
use crate::executor::predicate::{ColumnPredicate, FloatClass};

#[derive(Debug, Clone, Copy)]
pub struct FloatingHandler {
    code: TypeCode,
}

impl FloatingHandler {
    pub fn new(code: TypeCode) -> Self {
        Self { code }
    }

    fn is_double(&self) -> bool {
        self.code == TypeCode::Double
    }

    /// Encoded -inf and +inf
    fn bounds(&self) -> (i64, i64) {
        if self.is_double() {
            (
                double_to_sortable_long(f64::NEG_INFINITY),
                double_to_sortable_long(f64::INFINITY),
            )
        } else {
            (
                float_to_sortable_int(f32::NEG_INFINITY) as i64,
                float_to_sortable_int(f32::INFINITY) as i64,
            )
        }
    }
}

impl TypeHandler for FloatingHandler {
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
        let class = match op {
            Operator::IsNan => FloatClass::Nan,
            Operator::IsInfinite => FloatClass::Infinite,
            _ => {
                let (floor, ceiling) = self.bounds();
                return ordered_predicate(self, column, op, value, floor, ceiling);
            }
        };
        Ok(ColumnPredicate::Float {
            column,
            double: self.is_double(),
            class,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SchemaBuilder, Value};
    use crate::storage::{ColumnarTable, GeneratedTable, TableConfig};

    fn setup_table() -> ColumnarTable {
        let schema = SchemaBuilder::new("Reading")
            .add_id("id", TypeCode::Long)
            .add("value", TypeCode::Double)
            .add("weight", TypeCode::Float)
            .build()
            .unwrap();
        let table = ColumnarTable::new(schema, TableConfig::new());
        let rows = [
            (1, -2.5, -1.0f32),
            (2, 0.0, 0.5),
            (3, 3.75, f32::NAN),
            (4, f64::INFINITY, 2.0),
            (5, f64::NAN, f32::NEG_INFINITY),
        ];
        for (id, value, weight) in rows {
            table
                .insert_from(&[Value::Long(id), Value::Double(value), Value::Float(weight)])
                .unwrap();
        }
        table
    }

    fn run(table: &ColumnarTable, code: TypeCode, column: usize, op: Operator, value: ConditionValue) -> Vec<u32> {
        FloatingHandler::new(code)
            .execute_condition(table, column, op, &value, false)
            .unwrap()
            .to_row_indices()
    }

    #[test]
    fn test_ordering_across_sign_boundary() {
        let table = setup_table();
        let zero = || ConditionValue::Scalar(Value::Double(0.0));
        assert_eq!(run(&table, TypeCode::Double, 1, Operator::Gt, zero()), vec![2, 3]);
        assert_eq!(run(&table, TypeCode::Double, 1, Operator::Lt, zero()), vec![0]);
        assert_eq!(run(&table, TypeCode::Double, 1, Operator::Gte, zero()), vec![1, 2, 3]);
        let between = ConditionValue::Range(Value::Double(-3.0), Value::Int(4));
        assert_eq!(run(&table, TypeCode::Double, 1, Operator::Between, between), vec![0, 1, 2]);
    }

    #[test]
    fn test_float_column() {
        let table = setup_table();
        let half = ConditionValue::Scalar(Value::Float(0.5));
        assert_eq!(run(&table, TypeCode::Float, 2, Operator::Eq, half), vec![1]);
        let ge = ConditionValue::Scalar(Value::Double(0.0));
        assert_eq!(run(&table, TypeCode::Float, 2, Operator::Gte, ge), vec![1, 3]);
    }

    #[test]
    fn test_nan_and_infinity() {
        let table = setup_table();
        assert_eq!(run(&table, TypeCode::Double, 1, Operator::IsNan, ConditionValue::None), vec![4]);
        assert_eq!(run(&table, TypeCode::Double, 1, Operator::IsInfinite, ConditionValue::None), vec![3]);
        assert_eq!(run(&table, TypeCode::Float, 2, Operator::IsNan, ConditionValue::None), vec![2]);
        assert_eq!(run(&table, TypeCode::Float, 2, Operator::IsInfinite, ConditionValue::None), vec![4]);
        assert_eq!(table.live_count(), 5);
    }
}
