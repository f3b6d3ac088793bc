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

//! Columnar table interface consumed by the query engine
//!

use std::sync::Arc;

use crate::core::{Result, RowRef, StorageKind, StorageValue, TypeCode, Value};

/// A columnar table with generation-tagged rows and seqlock-guarded reads
///
/// Scans return ascending row indices of rows that were live when the scan
/// visited them; callers turn them into references with
/// [`Selection::from_scan_indices`](crate::storage::Selection::from_scan_indices),
/// which re-validates liveness.
///
/// # Seqlock contract
///
/// Writers bump a per-row version to an odd value, write every column, then
/// bump it to the next even value. [`read_with_seqlock`](Self::read_with_seqlock)
/// runs the closure between two version reads and reruns it until both reads
/// observe the same even version, so the effects of the last run never mix
/// column values from two writes. The closure may therefore run more than once
/// and must only record what it reads.
pub trait GeneratedTable: Send + Sync {
    /// Table name, used in diagnostics
    fn name(&self) -> &str;

    /// Number of columns
    fn column_count(&self) -> usize;

    /// Logical type of a column
    fn type_code_at(&self, column: usize) -> TypeCode;

    /// Position of the id column
    fn id_column(&self) -> usize;

    /// Number of slots ever allocated (high-water mark, live or not)
    fn allocated_count(&self) -> u32;

    /// Number of live rows
    fn live_count(&self) -> usize;

    // =========================================================================
    // Row lifecycle
    // =========================================================================

    /// Insert a row (one value per column) and return its reference
    fn insert_from(&self, values: &[Value]) -> Result<RowRef>;

    /// Tombstone the row; returns false if the reference was already stale
    fn tombstone(&self, row: RowRef) -> bool;

    /// True while the slot still holds the generation captured in `row`
    fn is_live(&self, row: RowRef) -> bool;

    /// Reference to the current occupant of a slot, if it is live
    fn live_ref(&self, row_index: u32) -> Option<RowRef>;

    /// Current generation of a slot
    fn row_generation(&self, row_index: u32) -> u32;

    /// Table-wide mutation counter, bumped by every insert and tombstone
    fn current_generation(&self) -> u64;

    /// Reference of the live row with a numeric id
    fn lookup_by_id(&self, id: i64) -> Option<RowRef>;

    /// Reference of the live row with a string id
    fn lookup_by_id_string(&self, id: &str) -> Option<RowRef>;

    /// Tombstone the live row with the given id; returns true if one existed
    fn remove_by_id(&self, id: &StorageValue) -> bool {
        match self.lookup_id(id) {
            Some(row) => self.tombstone(row),
            None => false,
        }
    }

    /// Id lookup dispatching on the id's physical form
    fn lookup_id(&self, id: &StorageValue) -> Option<RowRef> {
        match id {
            StorageValue::Int(v) => self.lookup_by_id(*v as i64),
            StorageValue::Long(v) => self.lookup_by_id(*v),
            StorageValue::Str(s) => self.lookup_by_id_string(s),
            StorageValue::Null => None,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Run `read` against a consistent snapshot of one row
    fn read_with_seqlock(&self, row_index: u32, read: &mut dyn FnMut());

    /// Int-backed column value (0 when absent)
    fn read_int(&self, column: usize, row_index: u32) -> i32;

    /// Long-backed column value (0 when absent)
    fn read_long(&self, column: usize, row_index: u32) -> i64;

    /// String-backed column value
    fn read_string(&self, column: usize, row_index: u32) -> Option<Arc<str>>;

    /// False if the column holds null for this row
    fn is_present(&self, column: usize, row_index: u32) -> bool;

    /// Physical value of one cell
    fn read_storage(&self, column: usize, row_index: u32) -> StorageValue {
        if !self.is_present(column, row_index) {
            return StorageValue::Null;
        }
        match self.type_code_at(column).storage_kind() {
            StorageKind::Int => StorageValue::Int(self.read_int(column, row_index)),
            StorageKind::Long => StorageValue::Long(self.read_long(column, row_index)),
            StorageKind::String => self
                .read_string(column, row_index)
                .map_or(StorageValue::Null, StorageValue::Str),
        }
    }

    // =========================================================================
    // Scans
    // =========================================================================

    /// Every live row
    fn scan_all(&self) -> Vec<u32>;

    /// Live rows whose column is null
    fn scan_nulls(&self, column: usize) -> Vec<u32>;

    fn scan_equals_int(&self, column: usize, value: i32) -> Vec<u32>;

    fn scan_equals_long(&self, column: usize, value: i64) -> Vec<u32>;

    fn scan_equals_string(&self, column: usize, value: &str) -> Vec<u32>;

    fn scan_equals_string_ignore_case(&self, column: usize, value: &str) -> Vec<u32>;

    /// Inclusive range scan on an int-backed column
    fn scan_between_int(&self, column: usize, lower: i32, upper: i32) -> Vec<u32>;

    /// Inclusive range scan on a long-backed column
    fn scan_between_long(&self, column: usize, lower: i64, upper: i64) -> Vec<u32>;

    fn scan_in_int(&self, column: usize, values: &[i32]) -> Vec<u32>;

    fn scan_in_long(&self, column: usize, values: &[i64]) -> Vec<u32>;

    fn scan_in_string(&self, column: usize, values: &[Arc<str>]) -> Vec<u32>;

    /// Live rows whose present string value satisfies `predicate`
    fn scan_string_matching(&self, column: usize, predicate: &dyn Fn(&str) -> bool) -> Vec<u32>;

    /// Live rows whose present numeric value satisfies `predicate`
    ///
    /// Int-backed columns are widened to i64.
    fn scan_numeric_matching(&self, column: usize, predicate: &dyn Fn(i64) -> bool) -> Vec<u32>;
}
