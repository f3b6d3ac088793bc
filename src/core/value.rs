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

//! Runtime values
//!
//! [`Value`] is the dynamically typed currency of the engine: call-site
//! arguments, bound literals and materialized cells are all values.
//! [`StorageValue`] is the physical form a value takes inside an int, long or
//! string column once it has been converted for a given [`TypeCode`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

use super::error::{Error, Result};
use super::types::{StorageKind, TypeCode};
use crate::common::float_encoding::{
    double_to_sortable_long, float_to_sortable_int, sortable_int_to_float,
    sortable_long_to_double,
};

/// Days from 0001-01-01 (day 1) to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// A dynamically typed value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    String(Arc<str>),
    /// Canonical decimal string
    BigDecimal(Arc<str>),
    /// Canonical decimal string
    BigInteger(Arc<str>),
    Instant(DateTime<Utc>),
    LocalDate(NaiveDate),
    LocalDateTime(NaiveDateTime),
    Date(DateTime<Utc>),
    /// Argument list for IN / NOT IN
    List(Arc<[Value]>),
}

/// Physical column value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageValue {
    Null,
    Int(i32),
    Long(i64),
    Str(Arc<str>),
}

impl StorageValue {
    /// Returns true for the null marker
    pub fn is_null(&self) -> bool {
        matches!(self, StorageValue::Null)
    }

    /// Int and long payloads widened to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StorageValue::Int(v) => Some(*v as i64),
            StorageValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StorageValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl Value {
    /// Create a string value
    pub fn text(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    /// Create an IN argument list
    pub fn list(values: impl IntoIterator<Item = Value>) -> Self {
        Value::List(values.into_iter().collect::<Vec<_>>().into())
    }

    /// Returns true if this is the null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Variant name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Byte(_) => "Byte",
            Value::Short(_) => "Short",
            Value::Int(_) => "Int",
            Value::Long(_) => "Long",
            Value::Float(_) => "Float",
            Value::Double(_) => "Double",
            Value::Char(_) => "Char",
            Value::String(_) => "String",
            Value::BigDecimal(_) => "BigDecimal",
            Value::BigInteger(_) => "BigInteger",
            Value::Instant(_) => "Instant",
            Value::LocalDate(_) => "LocalDate",
            Value::LocalDateTime(_) => "LocalDateTime",
            Value::Date(_) => "Date",
            Value::List(_) => "List",
        }
    }

    /// Integral payload, without any float truncation
    pub fn as_integral(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(*v as i64),
            Value::Short(v) => Some(*v as i64),
            Value::Int(v) => Some(*v as i64),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Any numeric payload widened to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            other => other.as_integral().map(|v| v as f64),
        }
    }

    /// String-like payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::BigDecimal(s) | Value::BigInteger(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if this variant is the natural representation of `code`
    ///
    /// Strict IN decoding uses this check per element.
    pub fn matches_type(&self, code: TypeCode) -> bool {
        matches!(
            (self, code),
            (Value::Int(_), TypeCode::Int)
                | (Value::Long(_), TypeCode::Long)
                | (Value::Boolean(_), TypeCode::Boolean)
                | (Value::Byte(_), TypeCode::Byte)
                | (Value::Short(_), TypeCode::Short)
                | (Value::Float(_), TypeCode::Float)
                | (Value::Double(_), TypeCode::Double)
                | (Value::Char(_), TypeCode::Char)
                | (Value::String(_), TypeCode::String)
                | (Value::Instant(_), TypeCode::Instant)
                | (Value::LocalDate(_), TypeCode::LocalDate)
                | (Value::LocalDateTime(_), TypeCode::LocalDateTime)
                | (Value::Date(_), TypeCode::Date)
                | (Value::BigDecimal(_), TypeCode::BigDecimal)
                | (Value::BigInteger(_), TypeCode::BigInteger)
        )
    }

    /// Natural type code of this variant; `None` for null and lists
    pub fn type_code(&self) -> Option<TypeCode> {
        let code = match self {
            Value::Null | Value::List(_) => return None,
            Value::Boolean(_) => TypeCode::Boolean,
            Value::Byte(_) => TypeCode::Byte,
            Value::Short(_) => TypeCode::Short,
            Value::Int(_) => TypeCode::Int,
            Value::Long(_) => TypeCode::Long,
            Value::Float(_) => TypeCode::Float,
            Value::Double(_) => TypeCode::Double,
            Value::Char(_) => TypeCode::Char,
            Value::String(_) => TypeCode::String,
            Value::BigDecimal(_) => TypeCode::BigDecimal,
            Value::BigInteger(_) => TypeCode::BigInteger,
            Value::Instant(_) => TypeCode::Instant,
            Value::LocalDate(_) => TypeCode::LocalDate,
            Value::LocalDateTime(_) => TypeCode::LocalDateTime,
            Value::Date(_) => TypeCode::Date,
        };
        Some(code)
    }

    /// Hashable identity used for grouping and DISTINCT
    ///
    /// Values of the same variant map to equal keys exactly when they are
    /// equal; null and lists map to [`StorageValue::Null`].
    pub fn key(&self) -> StorageValue {
        self.type_code()
            .and_then(|code| self.to_storage(code).ok())
            .unwrap_or(StorageValue::Null)
    }

    /// Convert into the physical representation used for `code`
    ///
    /// Conversion is lenient over numeric variants (any integral value fits a
    /// LONG column, any nonzero number is a true BOOLEAN). Null converts to
    /// [`StorageValue::Null`].
    ///
    /// Narrowing is checked: a value outside the range of an INT, SHORT or
    /// BYTE column is an invalid-argument error rather than a wrapped
    /// truncation, so an out-of-range argument never matches or stores a
    /// different number.
    pub fn to_storage(&self, code: TypeCode) -> Result<StorageValue> {
        if self.is_null() {
            return Ok(StorageValue::Null);
        }
        let mismatch = || Error::type_conversion(self.type_name(), code.name());
        let converted = match code {
            TypeCode::Int => StorageValue::Int(narrow_i32(self.integral_or_truncated(), code)?),
            TypeCode::Long => StorageValue::Long(self.integral_or_truncated().ok_or_else(mismatch)?),
            TypeCode::Boolean => match self {
                Value::Boolean(b) => StorageValue::Int(*b as i32),
                other => {
                    let v = other.as_f64().ok_or_else(mismatch)?;
                    StorageValue::Int((v != 0.0) as i32)
                }
            },
            TypeCode::Byte => {
                let v = self.as_integral().ok_or_else(mismatch)?;
                let v = i8::try_from(v).map_err(|_| out_of_range(v, code))?;
                StorageValue::Int(v as i32)
            }
            TypeCode::Short => {
                let v = self.as_integral().ok_or_else(mismatch)?;
                let v = i16::try_from(v).map_err(|_| out_of_range(v, code))?;
                StorageValue::Int(v as i32)
            }
            TypeCode::Float => {
                let v = self.as_f64().ok_or_else(mismatch)?;
                StorageValue::Int(float_to_sortable_int(v as f32))
            }
            TypeCode::Double => {
                let v = self.as_f64().ok_or_else(mismatch)?;
                StorageValue::Long(double_to_sortable_long(v))
            }
            TypeCode::Char => match self {
                Value::Char(c) => StorageValue::Int(*c as i32),
                Value::String(s) => {
                    let mut chars = s.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => StorageValue::Int(c as i32),
                        _ => return Err(mismatch()),
                    }
                }
                _ => return Err(mismatch()),
            },
            TypeCode::String => match self {
                Value::String(s) => StorageValue::Str(Arc::clone(s)),
                Value::Char(c) => StorageValue::Str(Arc::from(c.to_string())),
                _ => return Err(mismatch()),
            },
            TypeCode::BigDecimal | TypeCode::BigInteger => match self {
                Value::BigDecimal(s) | Value::BigInteger(s) | Value::String(s) => {
                    StorageValue::Str(Arc::clone(s))
                }
                other => match other.as_integral() {
                    Some(v) => StorageValue::Str(Arc::from(v.to_string())),
                    None => return Err(mismatch()),
                },
            },
            TypeCode::Instant | TypeCode::Date => match self {
                Value::Instant(dt) | Value::Date(dt) => StorageValue::Long(dt.timestamp_millis()),
                other => StorageValue::Long(other.as_integral().ok_or_else(mismatch)?),
            },
            TypeCode::LocalDate => match self {
                Value::LocalDate(d) => StorageValue::Long(epoch_day(d)),
                other => StorageValue::Long(other.as_integral().ok_or_else(mismatch)?),
            },
            TypeCode::LocalDateTime => match self {
                Value::LocalDateTime(dt) => StorageValue::Long(dt.and_utc().timestamp_millis()),
                other => StorageValue::Long(other.as_integral().ok_or_else(mismatch)?),
            },
        };
        Ok(converted)
    }

    /// Rebuild the logical value stored for `code`
    pub fn from_storage(code: TypeCode, stored: &StorageValue) -> Result<Value> {
        let bad = || Error::type_conversion(format!("{:?}", stored), code.name());
        let value = match (code.storage_kind(), stored) {
            (_, StorageValue::Null) => Value::Null,
            (StorageKind::Int, StorageValue::Int(v)) => match code {
                TypeCode::Boolean => Value::Boolean(*v != 0),
                TypeCode::Byte => Value::Byte(*v as i8),
                TypeCode::Short => Value::Short(*v as i16),
                TypeCode::Float => Value::Float(sortable_int_to_float(*v)),
                TypeCode::Char => Value::Char(char::from_u32(*v as u32).ok_or_else(bad)?),
                _ => Value::Int(*v),
            },
            (StorageKind::Long, StorageValue::Long(v)) => match code {
                TypeCode::Double => Value::Double(sortable_long_to_double(*v)),
                TypeCode::Instant => Value::Instant(DateTime::from_timestamp_millis(*v).ok_or_else(bad)?),
                TypeCode::Date => Value::Date(DateTime::from_timestamp_millis(*v).ok_or_else(bad)?),
                TypeCode::LocalDate => Value::LocalDate(
                    i32::try_from(*v + UNIX_EPOCH_DAYS_FROM_CE)
                        .ok()
                        .and_then(NaiveDate::from_num_days_from_ce_opt)
                        .ok_or_else(bad)?,
                ),
                TypeCode::LocalDateTime => Value::LocalDateTime(
                    DateTime::from_timestamp_millis(*v)
                        .ok_or_else(bad)?
                        .naive_utc(),
                ),
                _ => Value::Long(*v),
            },
            (StorageKind::String, StorageValue::Str(s)) => match code {
                TypeCode::BigDecimal => Value::BigDecimal(Arc::clone(s)),
                TypeCode::BigInteger => Value::BigInteger(Arc::clone(s)),
                _ => Value::String(Arc::clone(s)),
            },
            _ => return Err(bad()),
        };
        Ok(value)
    }

    fn integral_or_truncated(&self) -> Option<i64> {
        match self {
            Value::Float(v) => Some(*v as i64),
            Value::Double(v) => Some(*v as i64),
            other => other.as_integral(),
        }
    }
}

/// Days since 1970-01-01
pub fn epoch_day(date: &NaiveDate) -> i64 {
    date.num_days_from_ce() as i64 - UNIX_EPOCH_DAYS_FROM_CE
}

fn narrow_i32(value: Option<i64>, code: TypeCode) -> Result<i32> {
    let v = value.ok_or_else(|| Error::type_conversion("non-numeric value", code.name()))?;
    i32::try_from(v).map_err(|_| out_of_range(v, code))
}

fn out_of_range(value: i64, code: TypeCode) -> Error {
    Error::invalid_argument(format!("value {} out of range for {}", value, code))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", v),
            Value::String(s) | Value::BigDecimal(s) | Value::BigInteger(s) => f.write_str(s),
            Value::Instant(dt) | Value::Date(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::LocalDate(d) => write!(f, "{}", d),
            Value::LocalDateTime(dt) => write!(f, "{}", dt),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::text(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(Arc::from(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v.into())
    }
}
