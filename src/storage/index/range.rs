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

//! Ordered index for equality and range lookups
//!

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::core::{IndexKind, Result, RowRef};
use crate::storage::index::IndexKey;
use crate::storage::traits::Index;

type Postings = SmallVec<[RowRef; 4]>;

/// BTreeMap-backed index (EQ, IN, GT, GTE, LT, LTE, BETWEEN)
///
/// Composite keys are ordered lexicographically, so a probe with an equality
/// prefix and `Min`/`Max` sentinels in the tail selects a contiguous run.
pub struct RangeIndex {
    name: String,
    columns: Vec<usize>,
    entries: RwLock<BTreeMap<IndexKey, Postings>>,
}

impl RangeIndex {
    /// Create an empty range index over `columns`
    pub fn new(name: impl Into<String>, columns: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            columns,
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Index for RangeIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Range
    }

    fn column_positions(&self) -> &[usize] {
        &self.columns
    }

    fn add(&self, key: IndexKey, row: RowRef) -> Result<()> {
        let mut entries = self.entries.write();
        let postings = entries.entry(key).or_default();
        if !postings.contains(&row) {
            postings.push(row);
        }
        Ok(())
    }

    fn remove(&self, key: &IndexKey, row: RowRef) -> Result<()> {
        let mut entries = self.entries.write();
        if let Some(postings) = entries.get_mut(key) {
            postings.retain(|r| *r != row);
            if postings.is_empty() {
                entries.remove(key);
            }
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.read().values().map(|p| p.len()).sum()
    }

    fn find_equal_into(&self, key: &IndexKey, out: &mut Vec<RowRef>) -> Result<()> {
        if let Some(postings) = self.entries.read().get(key) {
            out.extend_from_slice(postings);
        }
        Ok(())
    }

    fn find_range_into(
        &self,
        lower: Bound<&IndexKey>,
        upper: Bound<&IndexKey>,
        out: &mut Vec<RowRef>,
    ) -> Result<()> {
        // BTreeMap::range panics on inverted or doubly-excluded equal bounds
        if bounds_are_empty(lower, upper) {
            return Ok(());
        }
        let entries = self.entries.read();
        for postings in entries.range::<IndexKey, _>((lower, upper)).map(|(_, p)| p) {
            out.extend_from_slice(postings);
        }
        Ok(())
    }
}

fn bounds_are_empty(lower: Bound<&IndexKey>, upper: Bound<&IndexKey>) -> bool {
    match (lower, upper) {
        (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
        (Bound::Included(lo), Bound::Excluded(hi))
        | (Bound::Excluded(lo), Bound::Included(hi))
        | (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
        _ => false,
    }
}
