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

//! Selections: normalized sets of row references
//!
//! A [`Selection`] keeps its references sorted in scan order (slot index,
//! then generation) without duplicates, so union, intersection and
//! difference are linear merges and iteration yields rows in scan order.

use std::cmp::Ordering;

use crate::core::RowRef;
use crate::storage::traits::GeneratedTable;

/// Sorted, duplicate-free set of row references
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    refs: Vec<RowRef>,
}

impl Selection {
    /// The empty selection
    pub fn empty() -> Self {
        Self::default()
    }

    /// Normalize arbitrary references (any order, duplicates allowed)
    pub fn from_refs(mut refs: Vec<RowRef>) -> Self {
        radsort::sort_by_key(&mut refs, |r| r.scan_order_key());
        refs.dedup();
        Self { refs }
    }

    /// Build from raw scan indices, re-deriving each row's generation
    ///
    /// Rows that are no longer live at this point are dropped; this is where
    /// staleness between a scan and its use is filtered out.
    pub fn from_scan_indices(table: &dyn GeneratedTable, rows: &[u32]) -> Self {
        let refs = rows.iter().filter_map(|&row| table.live_ref(row)).collect();
        Self::from_refs(refs)
    }

    /// Build from index postings, keeping only references that are still live
    pub fn from_live_refs(table: &dyn GeneratedTable, refs: Vec<RowRef>) -> Self {
        let live = refs.into_iter().filter(|r| table.is_live(*r)).collect();
        Self::from_refs(live)
    }

    /// Every live row of the table
    pub fn all(table: &dyn GeneratedTable) -> Self {
        Self::from_scan_indices(table, &table.scan_all())
    }

    /// Number of references
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Returns true if there are no references
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// References in scan order
    pub fn refs(&self) -> &[RowRef] {
        &self.refs
    }

    /// Iterate over references in scan order
    pub fn iter(&self) -> impl Iterator<Item = RowRef> + '_ {
        self.refs.iter().copied()
    }

    /// Consume into the underlying references
    pub fn into_refs(self) -> Vec<RowRef> {
        self.refs
    }

    /// Membership test
    pub fn contains(&self, row: RowRef) -> bool {
        self.refs
            .binary_search_by(|probe| probe.cmp(&row))
            .is_ok()
    }

    /// Row indices, generation discarded
    pub fn to_row_indices(&self) -> Vec<u32> {
        self.refs.iter().map(|r| r.index()).collect()
    }

    /// Packed references
    pub fn to_ref_array(&self) -> Vec<u64> {
        self.refs.iter().map(|r| r.packed()).collect()
    }

    /// Drop references whose rows have been tombstoned since capture
    pub fn retain_live(&mut self, table: &dyn GeneratedTable) {
        self.refs.retain(|r| table.is_live(*r));
    }

    /// Keep references satisfying `keep`
    pub fn filter(&self, mut keep: impl FnMut(RowRef) -> bool) -> Selection {
        Selection {
            refs: self.refs.iter().copied().filter(|r| keep(*r)).collect(),
        }
    }

    /// Set union
    pub fn union(&self, other: &Selection) -> Selection {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let (a, b) = (&self.refs, &other.refs);
        let mut out = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                Ordering::Less => {
                    out.push(a[i]);
                    i += 1;
                }
                Ordering::Greater => {
                    out.push(b[j]);
                    j += 1;
                }
                Ordering::Equal => {
                    out.push(a[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);
        Selection { refs: out }
    }

    /// Set intersection
    pub fn intersect(&self, other: &Selection) -> Selection {
        let (a, b) = (&self.refs, &other.refs);
        let mut out = Vec::with_capacity(a.len().min(b.len()));
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    out.push(a[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        Selection { refs: out }
    }

    /// Set difference (`self` minus `other`)
    pub fn subtract(&self, other: &Selection) -> Selection {
        if other.is_empty() {
            return self.clone();
        }
        let (a, b) = (&self.refs, &other.refs);
        let mut out = Vec::with_capacity(a.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() {
            if j >= b.len() {
                out.extend_from_slice(&a[i..]);
                break;
            }
            match a[i].cmp(&b[j]) {
                Ordering::Less => {
                    out.push(a[i]);
                    i += 1;
                }
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
            }
        }
        Selection { refs: out }
    }
}

impl FromIterator<RowRef> for Selection {
    fn from_iter<I: IntoIterator<Item = RowRef>>(iter: I) -> Self {
        Selection::from_refs(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(rows: &[(u32, u32)]) -> Selection {
        rows.iter().map(|&(r, g)| RowRef::pack(r, g)).collect()
    }

    #[test]
    fn test_normalization() {
        let s = Selection::from_refs(vec![
            RowRef::pack(5, 0),
            RowRef::pack(1, 3),
            RowRef::pack(5, 0),
            RowRef::pack(2, 0),
        ]);
        assert_eq!(s.len(), 3);
        assert_eq!(s.to_row_indices(), vec![1, 2, 5]);
        assert!(s.contains(RowRef::pack(1, 3)));
        assert!(!s.contains(RowRef::pack(1, 2)));
    }

    #[test]
    fn test_union_laws() {
        let a = sel(&[(1, 0), (3, 0), (5, 0)]);
        let b = sel(&[(2, 0), (3, 0)]);
        let c = sel(&[(9, 1)]);
        assert_eq!(a.union(&b), b.union(&a));
        assert_eq!(a.union(&b).union(&c), a.union(&b.union(&c)));
        assert_eq!(a.union(&Selection::empty()), a);
        assert_eq!(a.union(&b).to_row_indices(), vec![1, 2, 3, 5]);
    }

    #[test]
    fn test_intersect_and_subtract_laws() {
        let a = sel(&[(1, 0), (3, 0), (5, 0)]);
        let b = sel(&[(3, 0), (5, 1), (7, 0)]);
        assert_eq!(a.intersect(&a), a);
        assert!(a.subtract(&a).is_empty());
        assert_eq!(a.intersect(&b).to_row_indices(), vec![3]);
        // same slot, different generation: distinct rows
        assert_eq!(a.subtract(&b).to_row_indices(), vec![1, 5]);
        assert_eq!(Selection::empty().subtract(&a), Selection::empty());
    }

    #[test]
    fn test_ref_array() {
        let a = sel(&[(4, 2)]);
        assert_eq!(a.to_ref_array(), vec![RowRef::pack(4, 2).packed()]);
    }
}
