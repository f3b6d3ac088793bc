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

//! Index trait for secondary indexes
//!

use std::ops::Bound;

use crate::core::{Error, IndexKind, Result, RowRef};
use crate::storage::index::IndexKey;

/// Index represents a secondary index over one or more columns
///
/// Postings hold generation-tagged row references; callers filter probe
/// results for liveness. All methods take `&self` and use interior
/// mutability, so an index can be shared between readers and the writer that
/// maintains it.
///
/// # Index Kinds
///
/// - **Hash**: equality lookups (EQ, IN)
/// - **Range**: ordered lookups (EQ, IN, GT, GTE, LT, LTE, BETWEEN)
/// - **Prefix**: STARTING_WITH on a string column
/// - **Suffix**: ENDING_WITH on a string column
pub trait Index: Send + Sync {
    /// Returns the name of the index
    fn name(&self) -> &str;

    /// Returns the kind of this index
    fn kind(&self) -> IndexKind;

    /// Column positions covered by the index, in key order
    fn column_positions(&self) -> &[usize];

    /// Returns true if the index covers more than one column
    fn is_composite(&self) -> bool {
        self.column_positions().len() > 1
    }

    /// Adds a posting for `row` under `key`
    ///
    /// # Arguments
    /// * `key` - One key part per indexed column, never containing nulls
    /// * `row` - The row reference to record
    fn add(&self, key: IndexKey, row: RowRef) -> Result<()>;

    /// Removes the posting for `row` under `key`; missing postings are ignored
    fn remove(&self, key: &IndexKey, row: RowRef) -> Result<()>;

    /// Number of postings
    fn len(&self) -> usize;

    /// Returns true if the index holds no postings
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends the rows stored under exactly `key`
    fn find_equal_into(&self, _key: &IndexKey, _out: &mut Vec<RowRef>) -> Result<()> {
        Err(Error::not_supported(format!(
            "{} index '{}' does not support equality lookups",
            self.kind(),
            self.name()
        )))
    }

    /// Appends the rows stored under any of `keys`
    ///
    /// Default implementation unions one equality lookup per key.
    fn find_in_into(&self, keys: &[IndexKey], out: &mut Vec<RowRef>) -> Result<()> {
        for key in keys {
            self.find_equal_into(key, out)?;
        }
        Ok(())
    }

    /// Appends the rows whose key lies within the bounds
    fn find_range_into(
        &self,
        _lower: Bound<&IndexKey>,
        _upper: Bound<&IndexKey>,
        _out: &mut Vec<RowRef>,
    ) -> Result<()> {
        Err(Error::not_supported(format!(
            "{} index '{}' does not support range lookups",
            self.kind(),
            self.name()
        )))
    }

    /// Appends the rows whose string key starts with `prefix`
    fn find_prefix_into(&self, _prefix: &str, _out: &mut Vec<RowRef>) -> Result<()> {
        Err(Error::not_supported(format!(
            "{} index '{}' does not support prefix lookups",
            self.kind(),
            self.name()
        )))
    }

    /// Appends the rows whose string key ends with `suffix`
    fn find_suffix_into(&self, _suffix: &str, _out: &mut Vec<RowRef>) -> Result<()> {
        Err(Error::not_supported(format!(
            "{} index '{}' does not support suffix lookups",
            self.kind(),
            self.name()
        )))
    }
}
