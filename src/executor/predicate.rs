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

//! Compiled column predicates
//!
//! A [`ColumnPredicate`] is a condition with its argument already decoded into
//! the column's physical encoding. The same value drives both evaluation
//! strategies:
//!
//! - [`scan`](ColumnPredicate::scan) maps onto the table's bulk columnar scans
//! - [`matches`](ColumnPredicate::matches) tests a single row (the residual
//!   filter applied after an index narrowed the candidates)
//!
//! Numeric payloads are widened to i64; int-backed columns clamp the range to
//! i32 before calling the native scan.

use std::sync::Arc;

use crate::common::float_encoding::{sortable_int_to_float, sortable_long_to_double};
use crate::core::StorageKind;
use crate::executor::pattern::StringPattern;
use crate::storage::{GeneratedTable, Selection};

/// Floating-point categories queryable by IS_NAN / IS_INFINITE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatClass {
    Nan,
    Infinite,
}

/// Condition over one column in physical encoding
#[derive(Debug, Clone)]
pub enum ColumnPredicate {
    // =========================================================================
    // Numeric (int- and long-backed columns, sortable float encodings)
    // =========================================================================
    /// lower <= col <= upper
    Range {
        column: usize,
        kind: StorageKind,
        lower: i64,
        upper: i64,
    },
    /// col IN (sorted, deduplicated values)
    NumericIn {
        column: usize,
        kind: StorageKind,
        values: Vec<i64>,
    },
    /// IS_NAN / IS_INFINITE on a FLOAT (int-backed) or DOUBLE (long-backed) column
    Float {
        column: usize,
        double: bool,
        class: FloatClass,
    },

    // =========================================================================
    // Strings
    // =========================================================================
    /// col = value (case-sensitive)
    StringEq { column: usize, value: Arc<str> },
    /// col IN (values), case-sensitive
    StringIn {
        column: usize,
        values: Vec<Arc<str>>,
    },
    /// Pattern match (LIKE, prefix, suffix, containment, ignore-case equality)
    StringMatch {
        column: usize,
        pattern: StringPattern,
    },
    /// Ignore-case IN, values already lowercased
    StringInIgnoreCase {
        column: usize,
        values: Vec<Arc<str>>,
    },

    // =========================================================================
    // Null checks
    // =========================================================================
    /// col IS NULL
    IsNull { column: usize },

    // =========================================================================
    // Logical
    // =========================================================================
    /// Every live row not matched by the inner predicate (nulls included)
    Not(Box<ColumnPredicate>),
    /// Every live row
    True,
    /// No row
    False,
}

impl ColumnPredicate {
    /// Inclusive numeric range; an inverted range matches nothing
    pub fn range(column: usize, kind: StorageKind, lower: i64, upper: i64) -> Self {
        if lower > upper {
            ColumnPredicate::False
        } else {
            ColumnPredicate::Range {
                column,
                kind,
                lower,
                upper,
            }
        }
    }

    /// Numeric IN; an empty list matches nothing
    pub fn numeric_in(column: usize, kind: StorageKind, mut values: Vec<i64>) -> Self {
        if values.is_empty() {
            return ColumnPredicate::False;
        }
        values.sort_unstable();
        values.dedup();
        ColumnPredicate::NumericIn {
            column,
            kind,
            values,
        }
    }

    /// String IN; an empty list matches nothing
    pub fn string_in(column: usize, mut values: Vec<Arc<str>>, ignore_case: bool) -> Self {
        if values.is_empty() {
            return ColumnPredicate::False;
        }
        if ignore_case {
            values = values
                .iter()
                .map(|v| Arc::from(v.to_lowercase().as_str()))
                .collect();
        }
        values.sort_unstable();
        values.dedup();
        if ignore_case {
            ColumnPredicate::StringInIgnoreCase { column, values }
        } else {
            ColumnPredicate::StringIn { column, values }
        }
    }

    /// Complement of `self` within the live rows
    pub fn negate(self) -> Self {
        match self {
            ColumnPredicate::True => ColumnPredicate::False,
            ColumnPredicate::False => ColumnPredicate::True,
            ColumnPredicate::Not(inner) => *inner,
            other => ColumnPredicate::Not(Box::new(other)),
        }
    }

    /// Column read by this predicate, if any
    pub fn column(&self) -> Option<usize> {
        match self {
            ColumnPredicate::Range { column, .. }
            | ColumnPredicate::NumericIn { column, .. }
            | ColumnPredicate::Float { column, .. }
            | ColumnPredicate::StringEq { column, .. }
            | ColumnPredicate::StringIn { column, .. }
            | ColumnPredicate::StringMatch { column, .. }
            | ColumnPredicate::StringInIgnoreCase { column, .. }
            | ColumnPredicate::IsNull { column } => Some(*column),
            ColumnPredicate::Not(inner) => inner.column(),
            ColumnPredicate::True | ColumnPredicate::False => None,
        }
    }

    /// Returns true if the predicate can never match
    pub fn is_false(&self) -> bool {
        matches!(self, ColumnPredicate::False)
    }

    /// Evaluate with the table's bulk scans
    pub fn scan(&self, table: &dyn GeneratedTable) -> Selection {
        match self {
            ColumnPredicate::True => Selection::all(table),
            ColumnPredicate::False => Selection::empty(),
            ColumnPredicate::Not(inner) => Selection::all(table).subtract(&inner.scan(table)),
            other => Selection::from_scan_indices(table, &other.scan_indices(table)),
        }
    }

    fn scan_indices(&self, table: &dyn GeneratedTable) -> Vec<u32> {
        match self {
            ColumnPredicate::Range {
                column,
                kind: StorageKind::Int,
                lower,
                upper,
            } => match clamp_i32(*lower, *upper) {
                Some((lo, hi)) => table.scan_between_int(*column, lo, hi),
                None => Vec::new(),
            },
            ColumnPredicate::Range {
                column,
                lower,
                upper,
                ..
            } => table.scan_between_long(*column, *lower, *upper),
            ColumnPredicate::NumericIn {
                column,
                kind: StorageKind::Int,
                values,
            } => {
                let narrowed: Vec<i32> =
                    values.iter().filter_map(|v| i32::try_from(*v).ok()).collect();
                table.scan_in_int(*column, &narrowed)
            }
            ColumnPredicate::NumericIn { column, values, .. } => {
                table.scan_in_long(*column, values)
            }
            ColumnPredicate::Float {
                column,
                double,
                class,
            } => {
                let (double, class) = (*double, *class);
                table.scan_numeric_matching(*column, &|v| float_matches(v, double, class))
            }
            ColumnPredicate::StringEq { column, value } => table.scan_equals_string(*column, value),
            ColumnPredicate::StringIn { column, values } => table.scan_in_string(*column, values),
            ColumnPredicate::StringMatch { column, pattern } => {
                table.scan_string_matching(*column, &|s| pattern.matches(s))
            }
            ColumnPredicate::StringInIgnoreCase { column, values } => table
                .scan_string_matching(*column, &|s| {
                    let folded = s.to_lowercase();
                    values.binary_search_by(|v| v.as_ref().cmp(folded.as_str())).is_ok()
                }),
            ColumnPredicate::IsNull { column } => table.scan_nulls(*column),
            ColumnPredicate::True => table.scan_all(),
            ColumnPredicate::False => Vec::new(),
            ColumnPredicate::Not(inner) => inner.scan(table).to_row_indices(),
        }
    }

    /// Test one row
    ///
    /// Reads the row's columns directly; callers evaluating several predicates
    /// against one row wrap the calls in a single seqlock read.
    pub fn matches(&self, table: &dyn GeneratedTable, row: u32) -> bool {
        match self {
            ColumnPredicate::True => true,
            ColumnPredicate::False => false,
            ColumnPredicate::Not(inner) => !inner.matches(table, row),
            ColumnPredicate::IsNull { column } => !table.is_present(*column, row),
            ColumnPredicate::Range {
                column,
                kind,
                lower,
                upper,
            } => numeric(table, *column, *kind, row).is_some_and(|v| v >= *lower && v <= *upper),
            ColumnPredicate::NumericIn {
                column,
                kind,
                values,
            } => numeric(table, *column, *kind, row).is_some_and(|v| values.binary_search(&v).is_ok()),
            ColumnPredicate::Float {
                column,
                double,
                class,
            } => {
                let kind = if *double {
                    StorageKind::Long
                } else {
                    StorageKind::Int
                };
                numeric(table, *column, kind, row).is_some_and(|v| float_matches(v, *double, *class))
            }
            ColumnPredicate::StringEq { column, value } => {
                string(table, *column, row).is_some_and(|s| s.as_ref() == value.as_ref())
            }
            ColumnPredicate::StringIn { column, values } => string(table, *column, row)
                .is_some_and(|s| values.binary_search_by(|v| v.as_ref().cmp(s.as_ref())).is_ok()),
            ColumnPredicate::StringInIgnoreCase { column, values } => {
                string(table, *column, row).is_some_and(|s| {
                    let folded = s.to_lowercase();
                    values.binary_search_by(|v| v.as_ref().cmp(folded.as_str())).is_ok()
                })
            }
            ColumnPredicate::StringMatch { column, pattern } => {
                string(table, *column, row).is_some_and(|s| pattern.matches(&s))
            }
        }
    }
}

fn clamp_i32(lower: i64, upper: i64) -> Option<(i32, i32)> {
    if lower > i32::MAX as i64 || upper < i32::MIN as i64 {
        return None;
    }
    Some((
        lower.max(i32::MIN as i64) as i32,
        upper.min(i32::MAX as i64) as i32,
    ))
}

#[inline]
fn numeric(table: &dyn GeneratedTable, column: usize, kind: StorageKind, row: u32) -> Option<i64> {
    if !table.is_present(column, row) {
        return None;
    }
    match kind {
        StorageKind::Int => Some(table.read_int(column, row) as i64),
        StorageKind::Long => Some(table.read_long(column, row)),
        StorageKind::String => None,
    }
}

#[inline]
fn string(table: &dyn GeneratedTable, column: usize, row: u32) -> Option<Arc<str>> {
    table.read_string(column, row)
}

fn float_matches(encoded: i64, double: bool, class: FloatClass) -> bool {
    let value = if double {
        sortable_long_to_double(encoded)
    } else {
        sortable_int_to_float(encoded as i32) as f64
    };
    match class {
        FloatClass::Nan => value.is_nan(),
        FloatClass::Infinite => value.is_infinite(),
    }
}
