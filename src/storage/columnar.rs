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

//! Reference columnar table
//!
//! Typed column vectors with per-row seqlock versions, per-slot generations
//! and a free list for slot reuse.
//!
//! # Lock Design
//!
//! - One `RwLock` per column for the value and presence vectors
//! - One `RwLock` over the slot metadata (atomics inside, so readers only
//!   ever take the read side)
//! - A writer `Mutex` serializing inserts and tombstones
//!
//! Column vectors grow before the slot vector, so every slot index a reader
//! can observe is always backed by column storage. Readers never hold a lock
//! across the user closure of [`GeneratedTable::read_with_seqlock`]; the
//! per-row version counter is what makes multi-column reads consistent.

use std::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use log::{trace, warn};
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::core::{
    Error, Result, RowRef, Schema, StorageKind, StorageValue, TypeCode, Value,
};
use crate::storage::config::TableConfig;
use crate::storage::traits::GeneratedTable;

/// Per-slot metadata
struct SlotMeta {
    /// Seqlock version; odd while a write is in progress
    version: AtomicU64,
    /// Bumped on tombstone so stale references stop resolving
    generation: AtomicU32,
    live: AtomicBool,
}

impl SlotMeta {
    fn new() -> Self {
        Self {
            version: AtomicU64::new(0),
            generation: AtomicU32::new(0),
            live: AtomicBool::new(false),
        }
    }
}

enum ColumnValues {
    Int(Vec<i32>),
    Long(Vec<i64>),
    Str(Vec<Option<Arc<str>>>),
}

struct ColumnStore {
    values: ColumnValues,
    present: Vec<bool>,
}

impl ColumnStore {
    fn new(kind: StorageKind) -> Self {
        let values = match kind {
            StorageKind::Int => ColumnValues::Int(Vec::new()),
            StorageKind::Long => ColumnValues::Long(Vec::new()),
            StorageKind::String => ColumnValues::Str(Vec::new()),
        };
        Self {
            values,
            present: Vec::new(),
        }
    }

    fn push_empty(&mut self) {
        match &mut self.values {
            ColumnValues::Int(v) => v.push(0),
            ColumnValues::Long(v) => v.push(0),
            ColumnValues::Str(v) => v.push(None),
        }
        self.present.push(false);
    }

    fn write(&mut self, row: usize, value: &StorageValue) {
        let present = match (&mut self.values, value) {
            (ColumnValues::Int(v), StorageValue::Int(x)) => {
                v[row] = *x;
                true
            }
            (ColumnValues::Long(v), StorageValue::Long(x)) => {
                v[row] = *x;
                true
            }
            (ColumnValues::Str(v), StorageValue::Str(s)) => {
                v[row] = Some(Arc::clone(s));
                true
            }
            (ColumnValues::Str(v), StorageValue::Null) => {
                v[row] = None;
                false
            }
            _ => false,
        };
        self.present[row] = present;
    }
}

/// In-memory columnar table implementing [`GeneratedTable`]
pub struct ColumnarTable {
    schema: Schema,
    config: TableConfig,
    columns: Vec<RwLock<ColumnStore>>,
    slots: RwLock<Vec<SlotMeta>>,
    free_list: Mutex<Vec<u32>>,
    ids: RwLock<FxHashMap<StorageValue, RowRef>>,
    writer: Mutex<()>,
    live: AtomicUsize,
    generation: AtomicU64,
}

impl ColumnarTable {
    /// Create an empty table for `schema`
    pub fn new(schema: Schema, config: TableConfig) -> Self {
        let columns = schema
            .columns
            .iter()
            .map(|c| RwLock::new(ColumnStore::new(c.type_code.storage_kind())))
            .collect();
        Self {
            schema,
            config,
            columns,
            slots: RwLock::new(Vec::new()),
            free_list: Mutex::new(Vec::new()),
            ids: RwLock::new(FxHashMap::default()),
            writer: Mutex::new(()),
            live: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// Entity layout of this table
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Maximum number of slots
    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    fn reserve_slot(&self) -> Result<u32> {
        if let Some(slot) = self.free_list.lock().pop() {
            return Ok(slot);
        }
        let next = self.slots.read().len();
        if next >= self.config.capacity() {
            return Err(Error::CapacityExceeded {
                capacity: self.config.capacity(),
            });
        }
        for column in &self.columns {
            column.write().push_empty();
        }
        self.slots.write().push(SlotMeta::new());
        Ok(next as u32)
    }

    fn version(&self, row_index: u32) -> u64 {
        self.slots
            .read()
            .get(row_index as usize)
            .map_or(0, |s| s.version.load(Ordering::Acquire))
    }

    fn bump_version(&self, row_index: u32) {
        if let Some(slot) = self.slots.read().get(row_index as usize) {
            slot.version.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn backoff(&self, spins: u32, row_index: u32) -> u32 {
        let limit = self.config.seqlock_spin_limit;
        if spins == limit {
            warn!(
                "{}: seqlock read of row {} exceeded {} retries, yielding",
                self.schema.entity_name, row_index, limit
            );
        }
        if spins >= limit {
            std::thread::yield_now();
        } else {
            std::hint::spin_loop();
        }
        spins.saturating_add(1)
    }

    /// Live rows with a present value for which `matches` holds
    fn scan_column(&self, column: usize, matches: impl Fn(&ColumnValues, usize) -> bool) -> Vec<u32> {
        let Some(store) = self.columns.get(column) else {
            return Vec::new();
        };
        let slots = self.slots.read();
        let store = store.read();
        (0..slots.len())
            .filter(|&i| {
                slots[i].live.load(Ordering::Acquire) && store.present[i] && matches(&store.values, i)
            })
            .map(|i| i as u32)
            .collect()
    }

    fn int_at(values: &ColumnValues, i: usize) -> Option<i64> {
        match values {
            ColumnValues::Int(v) => Some(v[i] as i64),
            ColumnValues::Long(v) => Some(v[i]),
            ColumnValues::Str(_) => None,
        }
    }

    fn str_at(values: &ColumnValues, i: usize) -> Option<&str> {
        match values {
            ColumnValues::Str(v) => v[i].as_deref(),
            _ => None,
        }
    }
}

impl GeneratedTable for ColumnarTable {
    fn name(&self) -> &str {
        &self.schema.entity_name
    }

    fn column_count(&self) -> usize {
        self.schema.column_count()
    }

    fn type_code_at(&self, column: usize) -> TypeCode {
        self.schema
            .columns
            .get(column)
            .map_or(TypeCode::Int, |c| c.type_code)
    }

    fn id_column(&self) -> usize {
        self.schema.id_column()
    }

    fn allocated_count(&self) -> u32 {
        self.slots.read().len() as u32
    }

    fn live_count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    fn insert_from(&self, values: &[Value]) -> Result<RowRef> {
        let stored = self.schema.to_storage_row(values)?;
        let id = stored[self.schema.id_column()].clone();

        let _guard = self.writer.lock();
        if let Some(existing) = self.ids.read().get(&id) {
            if self.is_live(*existing) {
                return Err(Error::DuplicateId(format!("{:?}", id)));
            }
        }

        let slot = self.reserve_slot()?;
        let row = slot as usize;

        self.bump_version(slot);
        for (column, value) in self.columns.iter().zip(&stored) {
            column.write().write(row, value);
        }
        let generation = {
            let slots = self.slots.read();
            let meta = &slots[row];
            meta.live.store(true, Ordering::Release);
            meta.generation.load(Ordering::Acquire)
        };
        self.bump_version(slot);

        let row_ref = RowRef::pack(slot, generation);
        self.ids.write().insert(id, row_ref);
        self.live.fetch_add(1, Ordering::AcqRel);
        self.generation.fetch_add(1, Ordering::AcqRel);
        trace!("{}: inserted {:?}", self.schema.entity_name, row_ref);
        Ok(row_ref)
    }

    fn tombstone(&self, row: RowRef) -> bool {
        let _guard = self.writer.lock();
        if !self.is_live(row) {
            return false;
        }
        let slot = row.index();

        self.bump_version(slot);
        {
            let slots = self.slots.read();
            let meta = &slots[slot as usize];
            meta.live.store(false, Ordering::Release);
            meta.generation.fetch_add(1, Ordering::AcqRel);
        }
        self.bump_version(slot);

        let id = self.read_storage(self.schema.id_column(), slot);
        {
            let mut ids = self.ids.write();
            if ids.get(&id) == Some(&row) {
                ids.remove(&id);
            }
        }
        self.free_list.lock().push(slot);
        self.live.fetch_sub(1, Ordering::AcqRel);
        self.generation.fetch_add(1, Ordering::AcqRel);
        trace!("{}: tombstoned {:?}", self.schema.entity_name, row);
        true
    }

    fn is_live(&self, row: RowRef) -> bool {
        self.slots.read().get(row.index() as usize).is_some_and(|meta| {
            meta.live.load(Ordering::Acquire)
                && meta.generation.load(Ordering::Acquire) == row.generation()
        })
    }

    fn live_ref(&self, row_index: u32) -> Option<RowRef> {
        let slots = self.slots.read();
        let meta = slots.get(row_index as usize)?;
        let generation = meta.generation.load(Ordering::Acquire);
        meta.live
            .load(Ordering::Acquire)
            .then(|| RowRef::pack(row_index, generation))
    }

    fn row_generation(&self, row_index: u32) -> u32 {
        self.slots
            .read()
            .get(row_index as usize)
            .map_or(0, |meta| meta.generation.load(Ordering::Acquire))
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn lookup_by_id(&self, id: i64) -> Option<RowRef> {
        let key = match self.type_code_at(self.id_column()).storage_kind() {
            StorageKind::Int => StorageValue::Int(i32::try_from(id).ok()?),
            StorageKind::Long => StorageValue::Long(id),
            StorageKind::String => return None,
        };
        let row = *self.ids.read().get(&key)?;
        self.is_live(row).then_some(row)
    }

    fn lookup_by_id_string(&self, id: &str) -> Option<RowRef> {
        let row = *self.ids.read().get(&StorageValue::Str(Arc::from(id)))?;
        self.is_live(row).then_some(row)
    }

    fn read_with_seqlock(&self, row_index: u32, read: &mut dyn FnMut()) {
        let mut spins = 0u32;
        loop {
            let before = self.version(row_index);
            if before & 1 == 1 {
                spins = self.backoff(spins, row_index);
                continue;
            }
            read();
            fence(Ordering::Acquire);
            if self.version(row_index) == before {
                return;
            }
            spins = self.backoff(spins, row_index);
        }
    }

    fn read_int(&self, column: usize, row_index: u32) -> i32 {
        self.columns.get(column).map_or(0, |c| match &c.read().values {
            ColumnValues::Int(v) => v.get(row_index as usize).copied().unwrap_or(0),
            _ => 0,
        })
    }

    fn read_long(&self, column: usize, row_index: u32) -> i64 {
        self.columns.get(column).map_or(0, |c| match &c.read().values {
            ColumnValues::Long(v) => v.get(row_index as usize).copied().unwrap_or(0),
            ColumnValues::Int(v) => v.get(row_index as usize).map_or(0, |x| *x as i64),
            ColumnValues::Str(_) => 0,
        })
    }

    fn read_string(&self, column: usize, row_index: u32) -> Option<Arc<str>> {
        let store = self.columns.get(column)?.read();
        match &store.values {
            ColumnValues::Str(v) => v.get(row_index as usize).cloned().flatten(),
            _ => None,
        }
    }

    fn is_present(&self, column: usize, row_index: u32) -> bool {
        self.columns
            .get(column)
            .is_some_and(|c| c.read().present.get(row_index as usize).copied().unwrap_or(false))
    }

    fn scan_all(&self) -> Vec<u32> {
        let slots = self.slots.read();
        (0..slots.len())
            .filter(|&i| slots[i].live.load(Ordering::Acquire))
            .map(|i| i as u32)
            .collect()
    }

    fn scan_nulls(&self, column: usize) -> Vec<u32> {
        let Some(store) = self.columns.get(column) else {
            return Vec::new();
        };
        let slots = self.slots.read();
        let store = store.read();
        (0..slots.len())
            .filter(|&i| slots[i].live.load(Ordering::Acquire) && !store.present[i])
            .map(|i| i as u32)
            .collect()
    }

    fn scan_equals_int(&self, column: usize, value: i32) -> Vec<u32> {
        self.scan_column(column, |v, i| Self::int_at(v, i) == Some(value as i64))
    }

    fn scan_equals_long(&self, column: usize, value: i64) -> Vec<u32> {
        self.scan_column(column, |v, i| Self::int_at(v, i) == Some(value))
    }

    fn scan_equals_string(&self, column: usize, value: &str) -> Vec<u32> {
        self.scan_column(column, |v, i| Self::str_at(v, i) == Some(value))
    }

    fn scan_equals_string_ignore_case(&self, column: usize, value: &str) -> Vec<u32> {
        let needle = value.to_lowercase();
        self.scan_column(column, |v, i| {
            Self::str_at(v, i).is_some_and(|s| s.to_lowercase() == needle)
        })
    }

    fn scan_between_int(&self, column: usize, lower: i32, upper: i32) -> Vec<u32> {
        self.scan_column(column, |v, i| {
            Self::int_at(v, i).is_some_and(|x| x >= lower as i64 && x <= upper as i64)
        })
    }

    fn scan_between_long(&self, column: usize, lower: i64, upper: i64) -> Vec<u32> {
        self.scan_column(column, |v, i| {
            Self::int_at(v, i).is_some_and(|x| x >= lower && x <= upper)
        })
    }

    fn scan_in_int(&self, column: usize, values: &[i32]) -> Vec<u32> {
        let wanted: FxHashSet<i64> = values.iter().map(|v| *v as i64).collect();
        self.scan_column(column, |v, i| {
            Self::int_at(v, i).is_some_and(|x| wanted.contains(&x))
        })
    }

    fn scan_in_long(&self, column: usize, values: &[i64]) -> Vec<u32> {
        let wanted: FxHashSet<i64> = values.iter().copied().collect();
        self.scan_column(column, |v, i| {
            Self::int_at(v, i).is_some_and(|x| wanted.contains(&x))
        })
    }

    fn scan_in_string(&self, column: usize, values: &[Arc<str>]) -> Vec<u32> {
        let wanted: FxHashSet<&str> = values.iter().map(|s| s.as_ref()).collect();
        self.scan_column(column, |v, i| {
            Self::str_at(v, i).is_some_and(|s| wanted.contains(s))
        })
    }

    fn scan_string_matching(&self, column: usize, predicate: &dyn Fn(&str) -> bool) -> Vec<u32> {
        self.scan_column(column, |v, i| Self::str_at(v, i).is_some_and(predicate))
    }

    fn scan_numeric_matching(&self, column: usize, predicate: &dyn Fn(i64) -> bool) -> Vec<u32> {
        self.scan_column(column, |v, i| Self::int_at(v, i).is_some_and(predicate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SchemaBuilder;

    fn setup_table(capacity_pages: usize) -> ColumnarTable {
        let schema = SchemaBuilder::new("Person")
            .add_id("id", TypeCode::Long)
            .add("age", TypeCode::Int)
            .add_nullable("name", TypeCode::String)
            .build()
            .unwrap();
        ColumnarTable::new(
            schema,
            TableConfig::new().with_page_size(2).with_max_pages(capacity_pages),
        )
    }

    fn person(id: i64, age: i32, name: Option<&str>) -> Vec<Value> {
        vec![Value::Long(id), Value::Int(age), name.into()]
    }

    #[test]
    fn test_insert_and_read() {
        let table = setup_table(4);
        let r = table.insert_from(&person(1, 30, Some("ann"))).unwrap();
        assert_eq!(r.index(), 0);
        assert_eq!(table.read_long(0, 0), 1);
        assert_eq!(table.read_int(1, 0), 30);
        assert_eq!(table.read_string(2, 0).as_deref(), Some("ann"));
        assert_eq!(table.live_count(), 1);
        assert_eq!(table.lookup_by_id(1), Some(r));
        assert_eq!(table.lookup_by_id(2), None);
    }

    #[test]
    fn test_null_handling() {
        let table = setup_table(4);
        table.insert_from(&person(1, 30, None)).unwrap();
        assert!(!table.is_present(2, 0));
        assert_eq!(table.read_storage(2, 0), StorageValue::Null);
        assert_eq!(table.scan_nulls(2), vec![0]);

        let err = table
            .insert_from(&[Value::Long(2), Value::Null, Value::Null])
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_tombstone_bumps_generation_and_reuses_slot() {
        let table = setup_table(4);
        let first = table.insert_from(&person(1, 30, None)).unwrap();
        assert!(table.tombstone(first));
        assert!(!table.tombstone(first));
        assert!(!table.is_live(first));
        assert_eq!(table.lookup_by_id(1), None);

        let second = table.insert_from(&person(2, 40, None)).unwrap();
        assert_eq!(second.index(), first.index());
        assert_eq!(second.generation(), first.generation() + 1);
        assert!(table.is_live(second));
        assert!(!table.is_live(first));
        assert_eq!(table.live_ref(0), Some(second));
    }

    #[test]
    fn test_duplicate_id_and_capacity() {
        let table = setup_table(1);
        table.insert_from(&person(1, 30, None)).unwrap();
        let err = table.insert_from(&person(1, 31, None)).unwrap_err();
        assert!(matches!(err, Error::DuplicateId(_)));
        table.insert_from(&person(2, 31, None)).unwrap();
        let err = table.insert_from(&person(3, 32, None)).unwrap_err();
        assert_eq!(err, Error::CapacityExceeded { capacity: 2 });
    }

    #[test]
    fn test_scans_skip_dead_rows() {
        let table = setup_table(4);
        table.insert_from(&person(1, 20, Some("ann"))).unwrap();
        let dead = table.insert_from(&person(2, 30, Some("Bob"))).unwrap();
        table.insert_from(&person(3, 40, Some("bob"))).unwrap();
        table.tombstone(dead);

        assert_eq!(table.scan_all(), vec![0, 2]);
        assert_eq!(table.scan_between_int(1, 25, 45), vec![2]);
        assert_eq!(table.scan_in_int(1, &[20, 30]), vec![0]);
        assert_eq!(table.scan_equals_string_ignore_case(2, "BOB"), vec![2]);
        assert_eq!(table.scan_string_matching(2, &|s| s.starts_with('a')), vec![0]);
    }

    #[test]
    fn test_seqlock_read_consistency() {
        let table = Arc::new(setup_table(64));
        table.insert_from(&person(1, 1, None)).unwrap();

        let writer = {
            let table = Arc::clone(&table);
            std::thread::spawn(move || {
                for i in 2..60i64 {
                    let row = table.lookup_by_id(i - 1).unwrap();
                    table.tombstone(row);
                    // id and age always written as a matching pair
                    table.insert_from(&person(i, i as i32, None)).unwrap();
                }
            })
        };

        for _ in 0..2000 {
            let mut pair = (0i64, 0i32);
            table.read_with_seqlock(0, &mut || {
                pair = (table.read_long(0, 0), table.read_int(1, 0));
            });
            assert_eq!(pair.0, pair.1 as i64, "torn read {:?}", pair);
        }
        writer.join().unwrap();
    }
}
