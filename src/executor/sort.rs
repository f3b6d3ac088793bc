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

//! Sort and top-K
//!
//! ORDER BY keys are extracted once per candidate row into type-specialized
//! arrays (int, long, string; FLOAT and DOUBLE compare through their sortable
//! encodings), each with a presence flag. The comparator then never touches
//! the table.
//!
//! Ordering rules:
//! - nulls sort last in both directions
//! - multi-column keys compare lexicographically in declared order
//! - ties break by ascending row index
//!
//! With a limit below the candidate count a bounded heap selects the first K
//! rows in O(n log k); the result equals the prefix of a full sort.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::sync::Arc;

use log::debug;
use rayon::slice::ParallelSliceMut;

use crate::core::{RowRef, StorageKind};
use crate::storage::{Config, GeneratedTable};

/// One ORDER BY column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderBy {
    pub column: usize,
    pub ascending: bool,
}

impl OrderBy {
    pub fn asc(column: usize) -> Self {
        Self {
            column,
            ascending: true,
        }
    }

    pub fn desc(column: usize) -> Self {
        Self {
            column,
            ascending: false,
        }
    }
}

enum KeyColumn {
    Int(Vec<i32>),
    Long(Vec<i64>),
    Str(Vec<Option<Arc<str>>>),
}

impl KeyColumn {
    #[inline]
    fn compare(&self, a: usize, b: usize) -> Ordering {
        match self {
            KeyColumn::Int(keys) => keys[a].cmp(&keys[b]),
            KeyColumn::Long(keys) => keys[a].cmp(&keys[b]),
            KeyColumn::Str(keys) => keys[a].cmp(&keys[b]),
        }
    }
}

/// Reusable key buffers, one set per thread
#[derive(Default)]
struct SortScratch {
    ints: Vec<Vec<i32>>,
    longs: Vec<Vec<i64>>,
    strs: Vec<Vec<Option<Arc<str>>>>,
    flags: Vec<Vec<bool>>,
}

thread_local! {
    static SORT_SCRATCH: RefCell<SortScratch> = RefCell::new(SortScratch::default());
}

/// Extracted sort keys of a candidate list
struct SortKeys<'r> {
    rows: &'r [RowRef],
    columns: Vec<KeyColumn>,
    present: Vec<Vec<bool>>,
    ascending: Vec<bool>,
}

impl<'r> SortKeys<'r> {
    fn extract(table: &dyn GeneratedTable, rows: &'r [RowRef], order: &[OrderBy]) -> Self {
        let n = rows.len();
        let (mut columns, mut present) = SORT_SCRATCH.with(|scratch| {
            let mut scratch = scratch.borrow_mut();
            let mut columns = Vec::with_capacity(order.len());
            let mut present = Vec::with_capacity(order.len());
            for o in order {
                let column = match table.type_code_at(o.column).storage_kind() {
                    StorageKind::Int => KeyColumn::Int(scratch.ints.pop().unwrap_or_default()),
                    StorageKind::Long => KeyColumn::Long(scratch.longs.pop().unwrap_or_default()),
                    StorageKind::String => KeyColumn::Str(scratch.strs.pop().unwrap_or_default()),
                };
                columns.push(column);
                present.push(scratch.flags.pop().unwrap_or_default());
            }
            (columns, present)
        });
        for (column, flags) in columns.iter_mut().zip(present.iter_mut()) {
            match column {
                KeyColumn::Int(keys) => keys.resize(n, 0),
                KeyColumn::Long(keys) => keys.resize(n, 0),
                KeyColumn::Str(keys) => keys.resize(n, None),
            }
            flags.resize(n, false);
        }

        for (i, row) in rows.iter().enumerate() {
            let row_index = row.index();
            table.read_with_seqlock(row_index, &mut || {
                for ((o, column), flags) in order.iter().zip(columns.iter_mut()).zip(present.iter_mut()) {
                    let is_present = table.is_present(o.column, row_index);
                    flags[i] = is_present;
                    match column {
                        KeyColumn::Int(keys) => keys[i] = table.read_int(o.column, row_index),
                        KeyColumn::Long(keys) => keys[i] = table.read_long(o.column, row_index),
                        KeyColumn::Str(keys) => keys[i] = table.read_string(o.column, row_index),
                    }
                }
            });
        }

        Self {
            rows,
            columns,
            present,
            ascending: order.iter().map(|o| o.ascending).collect(),
        }
    }

    #[inline]
    fn compare(&self, a: usize, b: usize) -> Ordering {
        for (k, column) in self.columns.iter().enumerate() {
            let ordering = match (self.present[k][a], self.present[k][b]) {
                (false, false) => Ordering::Equal,
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                (true, true) if self.ascending[k] => column.compare(a, b),
                (true, true) => column.compare(a, b).reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        self.rows[a].cmp(&self.rows[b])
    }

    /// Hand the buffers back to this thread's scratch pool
    fn release(self) {
        SORT_SCRATCH.with(|scratch| {
            let mut scratch = scratch.borrow_mut();
            for column in self.columns {
                match column {
                    KeyColumn::Int(mut keys) => {
                        keys.clear();
                        scratch.ints.push(keys);
                    }
                    KeyColumn::Long(mut keys) => {
                        keys.clear();
                        scratch.longs.push(keys);
                    }
                    KeyColumn::Str(mut keys) => {
                        keys.clear();
                        scratch.strs.push(keys);
                    }
                }
            }
            for mut flags in self.present {
                flags.clear();
                scratch.flags.push(flags);
            }
        });
    }
}

/// Fully sort `rows` by `order`
pub fn sort_rows(table: &dyn GeneratedTable, rows: &[RowRef], order: &[OrderBy], config: &Config) -> Vec<RowRef> {
    if order.is_empty() {
        let mut sorted = rows.to_vec();
        sorted.sort_unstable();
        return sorted;
    }
    let keys = SortKeys::extract(table, rows, order);
    let mut positions: Vec<u32> = (0..rows.len() as u32).collect();
    if config.sorts_in_parallel(rows.len()) {
        debug!("parallel sort of {} rows", rows.len());
        positions.par_sort_unstable_by(|a, b| keys.compare(*a as usize, *b as usize));
    } else {
        positions.sort_unstable_by(|a, b| keys.compare(*a as usize, *b as usize));
    }
    let sorted = positions.iter().map(|&p| rows[p as usize]).collect();
    keys.release();
    sorted
}

/// The first `k` rows of the full ordering
pub fn top_k(
    table: &dyn GeneratedTable,
    rows: &[RowRef],
    order: &[OrderBy],
    k: usize,
    config: &Config,
) -> Vec<RowRef> {
    if k >= rows.len() {
        return sort_rows(table, rows, order, config);
    }
    if k == 0 {
        return Vec::new();
    }
    debug!("top-{} selection over {} rows", k, rows.len());
    let keys = SortKeys::extract(table, rows, order);
    let mut heap = BoundedHeap::new(k);
    for position in 0..rows.len() {
        heap.offer(position, |a, b| keys.compare(a, b));
    }
    let selected = heap.into_sorted(|a, b| keys.compare(a, b));
    let result = selected.into_iter().map(|p| rows[p]).collect();
    keys.release();
    result
}

/// Order, then skip `offset` and keep at most `limit` rows
pub fn order_and_page(
    table: &dyn GeneratedTable,
    rows: &[RowRef],
    order: &[OrderBy],
    offset: usize,
    limit: Option<usize>,
    config: &Config,
) -> Vec<RowRef> {
    let ordered = match limit {
        Some(limit) => top_k(table, rows, order, offset.saturating_add(limit), config),
        None if order.is_empty() => rows.to_vec(),
        None => sort_rows(table, rows, order, config),
    };
    ordered
        .into_iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// Max-heap of the k best positions seen so far; the worst sits at the root
struct BoundedHeap {
    capacity: usize,
    items: Vec<usize>,
}

impl BoundedHeap {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity),
        }
    }

    fn offer(&mut self, item: usize, cmp: impl Fn(usize, usize) -> Ordering) {
        if self.items.len() < self.capacity {
            self.items.push(item);
            self.sift_up(self.items.len() - 1, &cmp);
        } else if cmp(item, self.items[0]) == Ordering::Less {
            self.items[0] = item;
            self.sift_down(0, &cmp);
        }
    }

    fn sift_up(&mut self, mut i: usize, cmp: &impl Fn(usize, usize) -> Ordering) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if cmp(self.items[i], self.items[parent]) != Ordering::Greater {
                break;
            }
            self.items.swap(i, parent);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize, cmp: &impl Fn(usize, usize) -> Ordering) {
        let len = self.items.len();
        loop {
            let (left, right) = (2 * i + 1, 2 * i + 2);
            let mut largest = i;
            if left < len && cmp(self.items[left], self.items[largest]) == Ordering::Greater {
                largest = left;
            }
            if right < len && cmp(self.items[right], self.items[largest]) == Ordering::Greater {
                largest = right;
            }
            if largest == i {
                return;
            }
            self.items.swap(i, largest);
            i = largest;
        }
    }

    fn into_sorted(mut self, cmp: impl Fn(usize, usize) -> Ordering) -> Vec<usize> {
        self.items.sort_unstable_by(|a, b| cmp(*a, *b));
        self.items
    }
}
