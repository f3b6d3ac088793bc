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

//! Prefix and suffix indexes for string columns
//!
//! Both keep an ordered map from string to postings. The suffix index stores
//! every key reversed, so an ENDING_WITH probe becomes a prefix walk.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::core::{Error, IndexKind, Result, RowRef};
use crate::storage::index::{IndexKey, KeyPart};
use crate::storage::traits::Index;

type Postings = SmallVec<[RowRef; 4]>;

struct StringTree {
    entries: RwLock<BTreeMap<Arc<str>, Postings>>,
}

impl StringTree {
    fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    fn add(&self, key: Arc<str>, row: RowRef) {
        let mut entries = self.entries.write();
        let postings = entries.entry(key).or_default();
        if !postings.contains(&row) {
            postings.push(row);
        }
    }

    fn remove(&self, key: &str, row: RowRef) {
        let mut entries = self.entries.write();
        if let Some(postings) = entries.get_mut(key) {
            postings.retain(|r| *r != row);
            if postings.is_empty() {
                entries.remove(key);
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.read().values().map(|p| p.len()).sum()
    }

    fn find_prefix_into(&self, prefix: &str, out: &mut Vec<RowRef>) {
        let entries = self.entries.read();
        let start: Bound<&str> = Bound::Included(prefix);
        for (key, postings) in entries.range::<str, _>((start, Bound::Unbounded)) {
            if !key.starts_with(prefix) {
                break;
            }
            out.extend_from_slice(postings);
        }
    }
}

fn string_part<'a>(key: &'a IndexKey, index: &str) -> Result<&'a str> {
    match (key.len(), key.first()) {
        (1, Some(KeyPart::Str(s))) => Ok(s),
        _ => Err(Error::invalid_argument(format!(
            "index '{}' only accepts single string keys",
            index
        ))),
    }
}

fn reversed(s: &str) -> Arc<str> {
    Arc::from(s.chars().rev().collect::<String>())
}

/// STARTING_WITH index
pub struct PrefixIndex {
    name: String,
    columns: Vec<usize>,
    tree: StringTree,
}

impl PrefixIndex {
    /// Create an empty prefix index over one string column
    pub fn new(name: impl Into<String>, column: usize) -> Self {
        Self {
            name: name.into(),
            columns: vec![column],
            tree: StringTree::new(),
        }
    }
}

impl Index for PrefixIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Prefix
    }

    fn column_positions(&self) -> &[usize] {
        &self.columns
    }

    fn add(&self, key: IndexKey, row: RowRef) -> Result<()> {
        let s = string_part(&key, &self.name)?;
        self.tree.add(Arc::from(s), row);
        Ok(())
    }

    fn remove(&self, key: &IndexKey, row: RowRef) -> Result<()> {
        self.tree.remove(string_part(key, &self.name)?, row);
        Ok(())
    }

    fn len(&self) -> usize {
        self.tree.len()
    }

    fn find_prefix_into(&self, prefix: &str, out: &mut Vec<RowRef>) -> Result<()> {
        self.tree.find_prefix_into(prefix, out);
        Ok(())
    }
}

/// ENDING_WITH index
pub struct SuffixIndex {
    name: String,
    columns: Vec<usize>,
    tree: StringTree,
}

impl SuffixIndex {
    /// Create an empty suffix index over one string column
    pub fn new(name: impl Into<String>, column: usize) -> Self {
        Self {
            name: name.into(),
            columns: vec![column],
            tree: StringTree::new(),
        }
    }
}

impl Index for SuffixIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Suffix
    }

    fn column_positions(&self) -> &[usize] {
        &self.columns
    }

    fn add(&self, key: IndexKey, row: RowRef) -> Result<()> {
        let s = string_part(&key, &self.name)?;
        self.tree.add(reversed(s), row);
        Ok(())
    }

    fn remove(&self, key: &IndexKey, row: RowRef) -> Result<()> {
        let s = string_part(key, &self.name)?;
        self.tree.remove(&reversed(s), row);
        Ok(())
    }

    fn len(&self) -> usize {
        self.tree.len()
    }

    fn find_suffix_into(&self, suffix: &str, out: &mut Vec<RowRef>) -> Result<()> {
        self.tree.find_prefix_into(&reversed(suffix), out);
        Ok(())
    }
}
