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

//! Condition argument decoding
//!
//! Turns the caller's argument slice into the value shape an operator
//! consumes. Scalar arguments are converted leniently later by the type
//! handler; IN lists are checked strictly here, element by element.

use crate::core::{Error, Operator, Result, TypeCode, Value};

/// Decoded argument of one condition
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    /// IS_NULL, IS_TRUE, ... take no argument
    None,
    Scalar(Value),
    /// BETWEEN bounds, both non-null
    Range(Value, Value),
    /// IN / NOT_IN elements, all non-null and of the column's type
    List(Vec<Value>),
}

impl ConditionValue {
    /// Scalar payload, `Value::Null` for the other shapes
    pub fn scalar(&self) -> &Value {
        match self {
            ConditionValue::Scalar(v) => v,
            _ => &Value::Null,
        }
    }
}

/// Argument at `index`
pub fn arg_at(args: &[Value], index: usize) -> Result<&Value> {
    args.get(index).ok_or_else(|| {
        Error::invalid_argument(format!(
            "argument index {} out of range for {} arguments",
            index,
            args.len()
        ))
    })
}

/// Decode the argument(s) consumed by `op` starting at `arg_index`
pub fn decode(op: Operator, type_code: TypeCode, args: &[Value], arg_index: usize) -> Result<ConditionValue> {
    match op {
        Operator::Between => {
            let (lower, upper) = decode_between(args, arg_index)?;
            Ok(ConditionValue::Range(lower, upper))
        }
        Operator::In | Operator::NotIn => {
            Ok(ConditionValue::List(decode_in(arg_at(args, arg_index)?, type_code)?))
        }
        op if op.needs_value() => Ok(ConditionValue::Scalar(arg_at(args, arg_index)?.clone())),
        _ => Ok(ConditionValue::None),
    }
}

/// BETWEEN reads two consecutive arguments; both must be present and non-null
pub fn decode_between(args: &[Value], arg_index: usize) -> Result<(Value, Value)> {
    let bound = |offset: usize, name: &str| -> Result<Value> {
        match args.get(arg_index + offset) {
            Some(v) if !v.is_null() => Ok(v.clone()),
            _ => Err(Error::invalid_argument(format!(
                "BETWEEN requires a non-null {} bound at argument index {}",
                name,
                arg_index + offset
            ))),
        }
    };
    Ok((bound(0, "lower")?, bound(1, "upper")?))
}

/// Strict IN decoding
///
/// A null top-level value is an empty list and a scalar is a one-element list.
/// Every element must be non-null and of the column's natural variant.
pub fn decode_in(value: &Value, type_code: TypeCode) -> Result<Vec<Value>> {
    let elements: Vec<Value> = match value {
        Value::Null => return Ok(Vec::new()),
        Value::List(items) => items.to_vec(),
        scalar => vec![scalar.clone()],
    };
    for (i, element) in elements.iter().enumerate() {
        if element.is_null() {
            return Err(Error::invalid_argument(format!(
                "IN values cannot contain nulls (type {}, index {})",
                type_code, i
            )));
        }
        if !element.matches_type(type_code) {
            return Err(Error::invalid_argument(format!(
                "IN value at index {} for type {} must be {} but was {}",
                i,
                type_code,
                expected_variant(type_code),
                element.type_name()
            )));
        }
    }
    Ok(elements)
}

fn expected_variant(code: TypeCode) -> &'static str {
    match code {
        TypeCode::Int => "Int",
        TypeCode::Long => "Long",
        TypeCode::Boolean => "Boolean",
        TypeCode::Byte => "Byte",
        TypeCode::Short => "Short",
        TypeCode::Float => "Float",
        TypeCode::Double => "Double",
        TypeCode::Char => "Char",
        TypeCode::String => "String",
        TypeCode::Instant => "Instant",
        TypeCode::LocalDate => "LocalDate",
        TypeCode::LocalDateTime => "LocalDateTime",
        TypeCode::Date => "Date",
        TypeCode::BigDecimal => "BigDecimal",
        TypeCode::BigInteger => "BigInteger",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_at_out_of_range() {
        let args = [Value::Int(1)];
        assert_eq!(arg_at(&args, 0).unwrap(), &Value::Int(1));
        assert!(arg_at(&args, 1).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_between_bounds() {
        let args = [Value::Int(1), Value::Int(5)];
        assert_eq!(decode_between(&args, 0).unwrap(), (Value::Int(1), Value::Int(5)));
        assert!(decode_between(&args, 1).unwrap_err().is_invalid_argument());
        let args = [Value::Int(1), Value::Null];
        assert!(decode_between(&args, 0).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_in_shapes() {
        assert!(decode_in(&Value::Null, TypeCode::Int).unwrap().is_empty());
        assert_eq!(decode_in(&Value::Int(3), TypeCode::Int).unwrap(), vec![Value::Int(3)]);
        let list = Value::list([Value::Int(1), Value::Int(2)]);
        assert_eq!(decode_in(&list, TypeCode::Int).unwrap().len(), 2);
    }

    #[test]
    fn test_in_rejects_nulls_and_mismatches() {
        let list = Value::list([Value::Int(1), Value::Null]);
        let err = decode_in(&list, TypeCode::Int).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidArgument("IN values cannot contain nulls (type INT, index 1)".into())
        );

        let list = Value::list([Value::Long(1)]);
        let err = decode_in(&list, TypeCode::Int).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidArgument("IN value at index 0 for type INT must be Int but was Long".into())
        );
    }

    #[test]
    fn test_decode_by_operator() {
        let args = [Value::Int(1), Value::Int(2)];
        assert_eq!(decode(Operator::IsNull, TypeCode::Int, &[], 0).unwrap(), ConditionValue::None);
        assert_eq!(
            decode(Operator::Gt, TypeCode::Int, &args, 1).unwrap(),
            ConditionValue::Scalar(Value::Int(2))
        );
        assert_eq!(
            decode(Operator::Between, TypeCode::Int, &args, 0).unwrap(),
            ConditionValue::Range(Value::Int(1), Value::Int(2))
        );
        assert_eq!(
            decode(Operator::NotIn, TypeCode::Int, &[Value::Null], 0).unwrap(),
            ConditionValue::List(vec![])
        );
    }
}
