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

//! Handler for string-backed columns
//!
//! STRING, BIG_DECIMAL and BIG_INTEGER store their canonical text. Equality,
//! IN and the pattern operators apply; ordering does not, since text order
//! disagrees with numeric order for the decimal types.

use std::sync::Arc;

use crate::core::{Error, Operator, Result, StorageValue, TypeCode, Value};
use crate::executor::decoders::ConditionValue;
use crate::executor::handlers::{unsupported, TypeHandler};
use crate::executor::pattern::StringPattern;
use crate::executor::predicate::ColumnPredicate;

#[derive(Debug, Clone, Copy)]
pub struct StringHandler {
    code: TypeCode,
}

impl StringHandler {
    pub fn new(code: TypeCode) -> Self {
        Self { code }
    }

    fn text(&self, value: &Value) -> Result<Option<Arc<str>>> {
        match self.convert_value(value)? {
            StorageValue::Str(s) => Ok(Some(s)),
            _ => Ok(None),
        }
    }
}

impl TypeHandler for StringHandler {
    fn type_code(&self) -> TypeCode {
        self.code
    }

    fn positive_predicate(
        &self,
        column: usize,
        op: Operator,
        value: &ConditionValue,
        ignore_case: bool,
    ) -> Result<ColumnPredicate> {
        if op == Operator::IsNull {
            return Ok(ColumnPredicate::IsNull { column });
        }
        if op == Operator::In {
            let ConditionValue::List(values) = value else {
                return Err(Error::invalid_argument("IN requires a list argument"));
            };
            let mut texts = Vec::with_capacity(values.len());
            for v in values {
                if let Some(s) = self.text(v)? {
                    texts.push(s);
                }
            }
            return Ok(ColumnPredicate::string_in(column, texts, ignore_case));
        }
        if !matches!(
            op,
            Operator::Eq
                | Operator::StartingWith
                | Operator::EndingWith
                | Operator::Containing
                | Operator::Like
        ) {
            return Err(unsupported(op, self.code));
        }

        let Some(text) = self.text(value.scalar())? else {
            return Ok(ColumnPredicate::False);
        };
        let pattern = match op {
            Operator::Eq if !ignore_case => {
                return Ok(ColumnPredicate::StringEq { column, value: text })
            }
            Operator::Eq => StringPattern::equal_ignore_case(&text),
            Operator::StartingWith => StringPattern::starting_with(&text, ignore_case),
            Operator::EndingWith => StringPattern::ending_with(&text, ignore_case),
            Operator::Containing => StringPattern::containing(&text, ignore_case),
            _ => StringPattern::like(&text, ignore_case)?,
        };
        Ok(ColumnPredicate::StringMatch { column, pattern })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SchemaBuilder;
    use crate::storage::{ColumnarTable, GeneratedTable, TableConfig};

    fn setup_table() -> ColumnarTable {
        let schema = SchemaBuilder::new("Customer")
            .add_id("id", TypeCode::Long)
            .add_nullable("name", TypeCode::String)
            .add("balance", TypeCode::BigDecimal)
            .build()
            .unwrap();
        let table = ColumnarTable::new(schema, TableConfig::new());
        let rows = [
            (1, Some("Johnson"), "10.50"),
            (2, Some("jackson"), "7"),
            (3, None, "10.50"),
            (4, Some("Smith"), "0.01"),
        ];
        for (id, name, balance) in rows {
            table
                .insert_from(&[Value::Long(id), name.into(), Value::BigDecimal(Arc::from(balance))])
                .unwrap();
        }
        table
    }

    fn run(table: &ColumnarTable, column: usize, op: Operator, value: Value, ignore_case: bool) -> Vec<u32> {
        let code = table.type_code_at(column);
        let value = match op {
            Operator::In | Operator::NotIn => ConditionValue::List(vec![value]),
            _ => ConditionValue::Scalar(value),
        };
        StringHandler::new(code)
            .execute_condition(table, column, op, &value, ignore_case)
            .unwrap()
            .to_row_indices()
    }

    #[test]
    fn test_equality() {
        let table = setup_table();
        assert_eq!(run(&table, 1, Operator::Eq, Value::text("Smith"), false), vec![3]);
        assert_eq!(run(&table, 1, Operator::Eq, Value::text("SMITH"), true), vec![3]);
        assert!(run(&table, 1, Operator::Eq, Value::text("SMITH"), false).is_empty());
        // NE keeps the null row
        assert_eq!(run(&table, 1, Operator::Ne, Value::text("Smith"), false), vec![0, 1, 2]);
    }

    #[test]
    fn test_patterns() {
        let table = setup_table();
        assert_eq!(run(&table, 1, Operator::EndingWith, Value::text("son"), false), vec![0, 1]);
        assert_eq!(run(&table, 1, Operator::StartingWith, Value::text("j"), true), vec![0, 1]);
        assert_eq!(run(&table, 1, Operator::StartingWith, Value::text("j"), false), vec![1]);
        assert_eq!(run(&table, 1, Operator::Containing, Value::text("mit"), false), vec![3]);
        assert_eq!(run(&table, 1, Operator::Like, Value::text("J_hn%"), false), vec![0]);
        assert_eq!(run(&table, 1, Operator::NotLike, Value::text("%son"), false), vec![2, 3]);
        assert_eq!(run(&table, 1, Operator::NotContaining, Value::text("ck"), false), vec![0, 2, 3]);
    }

    #[test]
    fn test_decimal_text() {
        let table = setup_table();
        assert_eq!(run(&table, 2, Operator::Eq, Value::BigDecimal(Arc::from("10.50")), false), vec![0, 2]);
        assert_eq!(run(&table, 2, Operator::In, Value::BigDecimal(Arc::from("7")), false), vec![1]);
        assert_eq!(run(&table, 2, Operator::Eq, Value::Long(7), false), vec![1]);
    }

    #[test]
    fn test_ordering_unsupported() {
        let table = setup_table();
        let handler = StringHandler::new(TypeCode::BigDecimal);
        let value = ConditionValue::Range(Value::text("1"), Value::text("2"));
        let err = handler
            .execute_condition(&table, 2, Operator::Between, &value, false)
            .unwrap_err();
        assert!(err.is_not_supported());
    }
}
