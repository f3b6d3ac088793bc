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

//! Core type definitions for Memris
//!
//! This module defines the fundamental tags: TypeCode, StorageKind, Operator,
//! Combinator, IndexKind and JoinType

use std::fmt;
use std::str::FromStr;

use super::error::Error;

/// Logical column type, stored as a single byte
///
/// The registry of type handlers is an array indexed by this byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TypeCode {
    Int = 0,
    Long = 1,
    /// Stored as int 0/1
    Boolean = 2,
    Byte = 3,
    Short = 4,
    /// Stored as the sortable int encoding
    Float = 5,
    /// Stored as the sortable long encoding
    Double = 6,
    /// Stored as the UTF-32 scalar value
    Char = 7,
    String = 8,
    /// Epoch milliseconds
    Instant = 9,
    /// Epoch days
    LocalDate = 10,
    /// Epoch milliseconds at UTC
    LocalDateTime = 11,
    /// Epoch milliseconds
    Date = 12,
    /// Canonical decimal string
    BigDecimal = 13,
    /// Canonical decimal string
    BigInteger = 14,
}

/// Physical column representation behind a type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Int,
    Long,
    String,
}

impl TypeCode {
    /// All known type codes, in code order
    pub const ALL: [TypeCode; 15] = [
        TypeCode::Int,
        TypeCode::Long,
        TypeCode::Boolean,
        TypeCode::Byte,
        TypeCode::Short,
        TypeCode::Float,
        TypeCode::Double,
        TypeCode::Char,
        TypeCode::String,
        TypeCode::Instant,
        TypeCode::LocalDate,
        TypeCode::LocalDateTime,
        TypeCode::Date,
        TypeCode::BigDecimal,
        TypeCode::BigInteger,
    ];

    /// Returns the type code as u8
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Create TypeCode from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Column representation used by the storage collaborator
    pub fn storage_kind(&self) -> StorageKind {
        match self {
            TypeCode::Int
            | TypeCode::Boolean
            | TypeCode::Byte
            | TypeCode::Short
            | TypeCode::Float
            | TypeCode::Char => StorageKind::Int,
            TypeCode::Long
            | TypeCode::Double
            | TypeCode::Instant
            | TypeCode::LocalDate
            | TypeCode::LocalDateTime
            | TypeCode::Date => StorageKind::Long,
            TypeCode::String | TypeCode::BigDecimal | TypeCode::BigInteger => StorageKind::String,
        }
    }

    /// Returns true if the stored form is a sortable float/double encoding
    pub fn is_floating(&self) -> bool {
        matches!(self, TypeCode::Float | TypeCode::Double)
    }

    /// Upper-case name used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            TypeCode::Int => "INT",
            TypeCode::Long => "LONG",
            TypeCode::Boolean => "BOOLEAN",
            TypeCode::Byte => "BYTE",
            TypeCode::Short => "SHORT",
            TypeCode::Float => "FLOAT",
            TypeCode::Double => "DOUBLE",
            TypeCode::Char => "CHAR",
            TypeCode::String => "STRING",
            TypeCode::Instant => "INSTANT",
            TypeCode::LocalDate => "LOCAL_DATE",
            TypeCode::LocalDateTime => "LOCAL_DATE_TIME",
            TypeCode::Date => "DATE",
            TypeCode::BigDecimal => "BIG_DECIMAL",
            TypeCode::BigInteger => "BIG_INTEGER",
        }
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TypeCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        TypeCode::ALL
            .iter()
            .copied()
            .find(|code| code.name() == upper)
            .ok_or_else(|| Error::invalid_argument(format!("unknown type code: {}", s)))
    }
}

/// Condition operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operator {
    Eq = 0,
    Ne = 1,
    Gt = 2,
    Gte = 3,
    Lt = 4,
    Lte = 5,
    /// Inclusive on both ends, reads two consecutive arguments
    Between = 6,
    In = 7,
    NotIn = 8,
    IsNull = 9,
    NotNull = 10,
    IsTrue = 11,
    IsFalse = 12,
    StartingWith = 13,
    EndingWith = 14,
    Containing = 15,
    NotStartingWith = 16,
    NotEndingWith = 17,
    NotContaining = 18,
    /// SQL LIKE with `%` and `_` wildcards
    Like = 19,
    NotLike = 20,
    IsNan = 21,
    IsInfinite = 22,
}

impl Operator {
    /// Returns true if this operator reads a call-site argument
    pub fn needs_value(&self) -> bool {
        !matches!(
            self,
            Operator::IsNull
                | Operator::NotNull
                | Operator::IsTrue
                | Operator::IsFalse
                | Operator::IsNan
                | Operator::IsInfinite
        )
    }

    /// Number of consecutive arguments consumed
    pub fn arity(&self) -> usize {
        match self {
            Operator::Between => 2,
            op if op.needs_value() => 1,
            _ => 0,
        }
    }

    /// Returns true if this operator is a null check
    pub fn is_null_check(&self) -> bool {
        matches!(self, Operator::IsNull | Operator::NotNull)
    }

    /// Returns true for EQ/GT/GTE/LT/LTE/BETWEEN
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte | Operator::Between
        )
    }

    /// Positive operator whose complement this operator is, if any
    ///
    /// Negated operators are evaluated as "all rows minus the positive match".
    pub fn positive(&self) -> Option<Self> {
        match self {
            Operator::Ne => Some(Operator::Eq),
            Operator::NotIn => Some(Operator::In),
            Operator::NotNull => Some(Operator::IsNull),
            Operator::NotStartingWith => Some(Operator::StartingWith),
            Operator::NotEndingWith => Some(Operator::EndingWith),
            Operator::NotContaining => Some(Operator::Containing),
            Operator::NotLike => Some(Operator::Like),
            _ => None,
        }
    }

    /// Returns the operator as u8
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Between => "BETWEEN",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::IsNull => "IS NULL",
            Operator::NotNull => "IS NOT NULL",
            Operator::IsTrue => "IS TRUE",
            Operator::IsFalse => "IS FALSE",
            Operator::StartingWith => "STARTING WITH",
            Operator::EndingWith => "ENDING WITH",
            Operator::Containing => "CONTAINING",
            Operator::NotStartingWith => "NOT STARTING WITH",
            Operator::NotEndingWith => "NOT ENDING WITH",
            Operator::NotContaining => "NOT CONTAINING",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::IsNan => "IS NAN",
            Operator::IsInfinite => "IS INFINITE",
        };
        f.write_str(s)
    }
}

/// Logical link from one condition to the next in a flat condition list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Combinator {
    #[default]
    And,
    Or,
}

/// Index kinds known to the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// Equality lookups only (EQ, IN)
    Hash,
    /// Ordered lookups (EQ, IN, GT, GTE, LT, LTE, BETWEEN)
    Range,
    /// STARTING_WITH on string columns
    Prefix,
    /// ENDING_WITH on string columns
    Suffix,
}

impl IndexKind {
    /// Returns true if a single-column index of this kind can answer `op`
    pub fn supports(&self, op: Operator) -> bool {
        match self {
            IndexKind::Hash => matches!(op, Operator::Eq | Operator::In),
            IndexKind::Range => matches!(
                op,
                Operator::Eq
                    | Operator::In
                    | Operator::Gt
                    | Operator::Gte
                    | Operator::Lt
                    | Operator::Lte
                    | Operator::Between
            ),
            IndexKind::Prefix => op == Operator::StartingWith,
            IndexKind::Suffix => op == Operator::EndingWith,
        }
    }

    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Hash => "hash",
            IndexKind::Range => "range",
            IndexKind::Prefix => "prefix",
            IndexKind::Suffix => "suffix",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Join semantics for many-to-one joins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
        };
        f.write_str(s)
    }
}
