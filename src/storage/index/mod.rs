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

//! Index implementations for Memris
//!
//! This module provides the secondary index structures and their plans:
//!
//! - [`HashIndex`] - Equality lookups, single or composite
//! - [`RangeIndex`] - Ordered lookups, single or composite
//! - [`PrefixIndex`] - STARTING_WITH on string columns
//! - [`SuffixIndex`] - ENDING_WITH on string columns
//! - [`TableIndexes`] - The set of indexes of one table and their maintenance

pub mod hash;
pub mod key;
pub mod pattern;
pub mod range;

use std::sync::Arc;

use log::debug;

use crate::core::{Error, IndexKind, Operator, Result, RowRef, Schema, StorageKind, StorageValue};
use crate::storage::traits::{GeneratedTable, Index};

// Re-export main types
pub use hash::HashIndex;
pub use key::{IndexKey, KeyPart};
pub use pattern::{PrefixIndex, SuffixIndex};
pub use range::RangeIndex;

/// Declarative description of one index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPlan {
    /// Index name
    pub name: String,

    /// Indexed field names, in key order
    pub fields: Vec<String>,

    /// Indexed column positions, in key order
    pub column_positions: Vec<usize>,

    /// Index kind
    pub kind: IndexKind,
}

impl IndexPlan {
    /// Create a plan over column positions
    pub fn new(name: impl Into<String>, kind: IndexKind, column_positions: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            column_positions,
            kind,
        }
    }

    /// Builder method to record field names
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    /// Returns true if the plan covers more than one column
    pub fn is_composite(&self) -> bool {
        self.column_positions.len() > 1
    }

    /// Check the plan's columns against the entity layout
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        check_columns(&self.name, self.kind, &self.column_positions, schema)
    }

    /// Instantiate the index described by this plan
    pub fn build(&self) -> Result<Arc<dyn Index>> {
        if self.column_positions.is_empty() {
            return Err(Error::invalid_argument(format!(
                "index '{}' covers no columns",
                self.name
            )));
        }
        let index: Arc<dyn Index> = match self.kind {
            IndexKind::Hash => Arc::new(HashIndex::new(&self.name, self.column_positions.clone())),
            IndexKind::Range => {
                Arc::new(RangeIndex::new(&self.name, self.column_positions.clone()))
            }
            IndexKind::Prefix | IndexKind::Suffix if self.is_composite() => {
                return Err(Error::not_supported(format!(
                    "{} index '{}' cannot span several columns",
                    self.kind, self.name
                )))
            }
            IndexKind::Prefix => Arc::new(PrefixIndex::new(&self.name, self.column_positions[0])),
            IndexKind::Suffix => Arc::new(SuffixIndex::new(&self.name, self.column_positions[0])),
        };
        Ok(index)
    }
}

/// All indexes of one table
///
/// Maintenance is synchronous: the repository runtime calls
/// [`on_insert`](Self::on_insert) after a row is written and
/// [`on_delete`](Self::on_delete) before it is tombstoned.
#[derive(Clone, Default)]
pub struct TableIndexes {
    indexes: Vec<Arc<dyn Index>>,
}

impl TableIndexes {
    /// Build every index described by `plans`
    pub fn new(plans: &[IndexPlan]) -> Result<Self> {
        let indexes = plans.iter().map(IndexPlan::build).collect::<Result<Vec<_>>>()?;
        Ok(Self { indexes })
    }

    /// Build every index described by `plans`, checking each against `schema`
    pub fn for_schema(schema: &Schema, plans: &[IndexPlan]) -> Result<Self> {
        for plan in plans {
            plan.validate(schema)?;
        }
        Self::new(plans)
    }

    /// Check every built index against `schema`
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        for index in &self.indexes {
            check_columns(index.name(), index.kind(), index.column_positions(), schema)?;
        }
        Ok(())
    }

    /// Returns true if the table has no indexes
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Iterate over all indexes
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Index>> {
        self.indexes.iter()
    }

    /// Index by name
    pub fn get(&self, name: &str) -> Result<&Arc<dyn Index>> {
        self.indexes
            .iter()
            .find(|i| i.name() == name)
            .ok_or_else(|| Error::IndexNotFound(name.to_string()))
    }

    /// First single-column index on `column` able to answer `op`
    pub fn single_column(&self, column: usize, op: Operator) -> Option<&Arc<dyn Index>> {
        self.indexes
            .iter()
            .find(|i| !i.is_composite() && i.column_positions()[0] == column && i.kind().supports(op))
    }

    /// Composite hash and range indexes
    pub fn composites(&self) -> impl Iterator<Item = &Arc<dyn Index>> {
        self.indexes.iter().filter(|i| i.is_composite())
    }

    /// Record a freshly inserted row in every index
    pub fn on_insert(&self, table: &dyn GeneratedTable, row: RowRef) -> Result<()> {
        for (index, key) in self.keys_for(table, row) {
            if let Some(key) = key {
                index.add(key, row)?;
            }
        }
        Ok(())
    }

    /// Drop a row from every index; call before tombstoning it
    pub fn on_delete(&self, table: &dyn GeneratedTable, row: RowRef) -> Result<()> {
        for (index, key) in self.keys_for(table, row) {
            if let Some(key) = key {
                index.remove(&key, row)?;
            }
        }
        Ok(())
    }

    fn keys_for<'a>(
        &'a self,
        table: &dyn GeneratedTable,
        row: RowRef,
    ) -> Vec<(&'a Arc<dyn Index>, Option<IndexKey>)> {
        let mut keys = Vec::with_capacity(self.indexes.len());
        let row_index = row.index();
        table.read_with_seqlock(row_index, &mut || {
            keys.clear();
            for index in &self.indexes {
                let values: Vec<StorageValue> = index
                    .column_positions()
                    .iter()
                    .map(|&col| table.read_storage(col, row_index))
                    .collect();
                keys.push((index, IndexKey::from_storage(&values)));
            }
        });
        if keys.iter().any(|(_, k)| k.is_none()) {
            debug!("row {:?} has null index columns, skipping those indexes", row);
        }
        keys
    }
}

fn check_columns(name: &str, kind: IndexKind, positions: &[usize], schema: &Schema) -> Result<()> {
    for &position in positions {
        let column = schema.column(position)?;
        let pattern = matches!(kind, IndexKind::Prefix | IndexKind::Suffix);
        if pattern && column.type_code.storage_kind() != StorageKind::String {
            return Err(Error::not_supported(format!(
                "{} index '{}' needs a string column, {}.{} is {}",
                kind, name, schema.entity_name, column.name, column.type_code
            )));
        }
    }
    Ok(())
}
