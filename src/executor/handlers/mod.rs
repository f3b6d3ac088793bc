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

//! Type handlers
//!
//! A [`TypeHandler`] knows how one logical type converts call-site values
//! into its physical encoding and which operators it supports. The
//! [`TypeHandlerRegistry`] dispatches by the one-byte type code through a
//! 256-slot array.
//!
//! - [`NumericHandler`] - INT, LONG, BYTE, SHORT, CHAR, BOOLEAN and temporal types
//! - [`FloatingHandler`] - FLOAT and DOUBLE over sortable encodings
//! - [`StringHandler`] - STRING, BIG_DECIMAL and BIG_INTEGER

pub mod floating;
pub mod numeric;
pub mod string;

use std::sync::Arc;

use crate::core::{Error, Operator, Result, StorageKind, StorageValue, TypeCode, Value};
use crate::executor::decoders::ConditionValue;
use crate::executor::predicate::ColumnPredicate;
use crate::storage::{GeneratedTable, Selection};

pub use floating::FloatingHandler;
pub use numeric::NumericHandler;
pub use string::StringHandler;

/// Per-type conversion and condition compilation
pub trait TypeHandler: Send + Sync {
    /// Logical type handled
    fn type_code(&self) -> TypeCode;

    /// Convert a call-site value into the column's physical encoding
    fn convert_value(&self, raw: &Value) -> Result<StorageValue> {
        raw.to_storage(self.type_code())
    }

    /// Predicate for a non-negated operator
    fn positive_predicate(
        &self,
        column: usize,
        op: Operator,
        value: &ConditionValue,
        ignore_case: bool,
    ) -> Result<ColumnPredicate>;

    /// Predicate for any operator
    ///
    /// Negated operators default to "all rows minus the positive match".
    fn predicate(
        &self,
        column: usize,
        op: Operator,
        value: &ConditionValue,
        ignore_case: bool,
    ) -> Result<ColumnPredicate> {
        match op.positive() {
            Some(positive) => Ok(self
                .positive_predicate(column, positive, value, ignore_case)?
                .negate()),
            None => self.positive_predicate(column, op, value, ignore_case),
        }
    }

    /// Evaluate a condition with a full columnar scan
    fn execute_condition(
        &self,
        table: &dyn GeneratedTable,
        column: usize,
        op: Operator,
        value: &ConditionValue,
        ignore_case: bool,
    ) -> Result<Selection> {
        Ok(self.predicate(column, op, value, ignore_case)?.scan(table))
    }
}

/// Error for an operator the type cannot evaluate
pub(crate) fn unsupported(op: Operator, code: TypeCode) -> Error {
    Error::not_supported(format!("operator {} is not supported for type {}", op, code))
}

/// Shared EQ/range/IN compilation for int- and long-backed encodings
///
/// `floor` and `ceiling` bound open-ended ranges (GT, LT, ...). A null
/// comparand matches nothing.
pub(crate) fn ordered_predicate(
    handler: &dyn TypeHandler,
    column: usize,
    op: Operator,
    value: &ConditionValue,
    floor: i64,
    ceiling: i64,
) -> Result<ColumnPredicate> {
    let kind = handler.type_code().storage_kind();
    let encode = |v: &Value| -> Result<Option<i64>> {
        Ok(handler.convert_value(v)?.as_i64())
    };
    let predicate = match op {
        Operator::IsNull => ColumnPredicate::IsNull { column },
        Operator::Eq => match encode(value.scalar())? {
            Some(v) => ColumnPredicate::range(column, kind, v, v),
            None => ColumnPredicate::False,
        },
        Operator::Gt => match encode(value.scalar())?.and_then(|v| v.checked_add(1)) {
            Some(v) => ColumnPredicate::range(column, kind, v, ceiling),
            None => ColumnPredicate::False,
        },
        Operator::Gte => match encode(value.scalar())? {
            Some(v) => ColumnPredicate::range(column, kind, v.max(floor), ceiling),
            None => ColumnPredicate::False,
        },
        Operator::Lt => match encode(value.scalar())?.and_then(|v| v.checked_sub(1)) {
            Some(v) => ColumnPredicate::range(column, kind, floor, v),
            None => ColumnPredicate::False,
        },
        Operator::Lte => match encode(value.scalar())? {
            Some(v) => ColumnPredicate::range(column, kind, floor, v.min(ceiling)),
            None => ColumnPredicate::False,
        },
        Operator::Between => match value {
            ConditionValue::Range(lower, upper) => match (encode(lower)?, encode(upper)?) {
                (Some(lo), Some(hi)) => ColumnPredicate::range(column, kind, lo, hi),
                _ => ColumnPredicate::False,
            },
            _ => {
                return Err(Error::invalid_argument("BETWEEN requires two bounds"));
            }
        },
        Operator::In => match value {
            ConditionValue::List(values) => {
                let mut encoded = Vec::with_capacity(values.len());
                for v in values {
                    if let Some(x) = encode(v)? {
                        encoded.push(x);
                    }
                }
                ColumnPredicate::numeric_in(column, kind, encoded)
            }
            _ => return Err(Error::invalid_argument("IN requires a list argument")),
        },
        other => return Err(unsupported(other, handler.type_code())),
    };
    Ok(predicate)
}

/// Type-code-indexed handler table
#[derive(Clone)]
pub struct TypeHandlerRegistry {
    handlers: Vec<Option<Arc<dyn TypeHandler>>>,
}

impl Default for TypeHandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TypeHandlerRegistry {
    /// Registry without any handler
    pub fn empty() -> Self {
        Self {
            handlers: vec![None; 256],
        }
    }

    /// Registry with a handler for every built-in type code
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for code in TypeCode::ALL {
            let handler: Arc<dyn TypeHandler> = match code.storage_kind() {
                StorageKind::String => Arc::new(StringHandler::new(code)),
                _ if code.is_floating() => Arc::new(FloatingHandler::new(code)),
                _ => Arc::new(NumericHandler::new(code)),
            };
            registry.register(handler);
        }
        registry
    }

    /// Install (or replace) the handler for its type code
    pub fn register(&mut self, handler: Arc<dyn TypeHandler>) {
        let slot = handler.type_code().as_u8() as usize;
        self.handlers[slot] = Some(handler);
    }

    /// Handler for a raw type code
    #[inline]
    pub fn get(&self, code: u8) -> Result<&Arc<dyn TypeHandler>> {
        self.handlers[code as usize]
            .as_ref()
            .ok_or_else(|| Error::missing_handler(code))
    }

    /// Handler for a logical type
    #[inline]
    pub fn for_type(&self, code: TypeCode) -> Result<&Arc<dyn TypeHandler>> {
        self.get(code.as_u8())
    }

    /// Handler for the natural type of a value
    pub fn for_value(&self, value: &Value) -> Result<&Arc<dyn TypeHandler>> {
        let code = value.type_code().ok_or_else(|| {
            Error::invalid_argument(format!("no type handler applies to {}", value.type_name()))
        })?;
        self.for_type(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_defaults() {
        let registry = TypeHandlerRegistry::with_defaults();
        for code in TypeCode::ALL {
            assert_eq!(registry.for_type(code).unwrap().type_code(), code);
        }
        assert_eq!(
            registry.for_value(&Value::Double(1.0)).unwrap().type_code(),
            TypeCode::Double
        );
        assert!(registry.for_value(&Value::Null).is_err());
    }

    #[test]
    fn test_missing_handler() {
        let registry = TypeHandlerRegistry::empty();
        let err = registry.for_type(TypeCode::Int).err().unwrap();
        assert!(err.is_configuration_error());
        assert!(TypeHandlerRegistry::with_defaults().get(200).is_err());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = TypeHandlerRegistry::empty();
        registry.register(Arc::new(NumericHandler::new(TypeCode::Long)));
        assert!(registry.for_type(TypeCode::Long).is_ok());
        assert!(registry.for_type(TypeCode::Int).is_err());
    }
}
