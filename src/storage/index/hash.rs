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

//! Hash index for equality lookups
//!
//! Postings live in an `AHashMap` with fixed seeds under a `parking_lot`
//! `RwLock`; small posting lists stay inline in a `SmallVec`.

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::common::maps::{new_index_map, IndexMap};
use crate::core::{IndexKind, Result, RowRef};
use crate::storage::index::IndexKey;
use crate::storage::traits::Index;

type Postings = SmallVec<[RowRef; 4]>;

/// Equality-only index (EQ, IN), single or composite
pub struct HashIndex {
    name: String,
    columns: Vec<usize>,
    entries: RwLock<IndexMap<IndexKey, Postings>>,
}

impl HashIndex {
    /// Create an empty hash index over `columns`
    pub fn new(name: impl Into<String>, columns: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            columns,
            entries: RwLock::new(new_index_map()),
        }
    }
}

impl Index for HashIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Hash
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

    fn find_in_into(&self, keys: &[IndexKey], out: &mut Vec<RowRef>) -> Result<()> {
        let entries = self.entries.read();
        for key in keys {
            if let Some(postings) = entries.get(key) {
                out.extend_from_slice(postings);
            }
        }
        Ok(())
    }
}
