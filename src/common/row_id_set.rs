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

//! Hybrid row-id accumulator
//!
//! Small sets are kept as a sorted `Vec<u32>`; once a set grows past the
//! configured threshold it switches to a bitset so that membership tests,
//! unions and intersections become word operations. Used by the COUNT and
//! EXISTS fast paths, which never need the generation half of a row
//! reference.

/// Default size at which the array representation upgrades to a bitset
pub const DEFAULT_BITSET_THRESHOLD: usize = 4096;

#[derive(Debug, Clone)]
enum Repr {
    Array(Vec<u32>),
    Bitset { words: Vec<u64>, len: usize },
}

/// Set of row indices with an array/bitset hybrid representation
#[derive(Debug, Clone)]
pub struct RowIdSet {
    repr: Repr,
    threshold: usize,
}

impl Default for RowIdSet {
    fn default() -> Self {
        Self::new(DEFAULT_BITSET_THRESHOLD)
    }
}

impl RowIdSet {
    /// Create an empty set with the given upgrade threshold
    pub fn new(threshold: usize) -> Self {
        Self {
            repr: Repr::Array(Vec::new()),
            threshold: threshold.max(1),
        }
    }

    /// Build a set from row indices in any order (duplicates allowed)
    pub fn from_rows(rows: impl IntoIterator<Item = u32>, threshold: usize) -> Self {
        let mut rows: Vec<u32> = rows.into_iter().collect();
        radsort::sort(&mut rows);
        rows.dedup();
        let mut set = Self {
            repr: Repr::Array(rows),
            threshold: threshold.max(1),
        };
        set.maybe_upgrade();
        set
    }

    /// Number of rows in the set
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Array(rows) => rows.len(),
            Repr::Bitset { len, .. } => *len,
        }
    }

    /// Returns true if the set has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the set currently uses the bitset representation
    pub fn is_bitset(&self) -> bool {
        matches!(self.repr, Repr::Bitset { .. })
    }

    /// Membership test
    pub fn contains(&self, row: u32) -> bool {
        match &self.repr {
            Repr::Array(rows) => rows.binary_search(&row).is_ok(),
            Repr::Bitset { words, .. } => bit_is_set(words, row),
        }
    }

    /// Add a row, returning true if it was not present
    pub fn insert(&mut self, row: u32) -> bool {
        let added = match &mut self.repr {
            Repr::Array(rows) => match rows.binary_search(&row) {
                Ok(_) => false,
                Err(pos) => {
                    rows.insert(pos, row);
                    true
                }
            },
            Repr::Bitset { words, len } => {
                let added = set_bit(words, row);
                if added {
                    *len += 1;
                }
                added
            }
        };
        if added {
            self.maybe_upgrade();
        }
        added
    }

    /// In-place union
    pub fn union_with(&mut self, other: &RowIdSet) {
        if let (Repr::Array(left), Repr::Array(right)) = (&self.repr, &other.repr) {
            self.repr = Repr::Array(merge_union(left, right));
            self.maybe_upgrade();
            return;
        }
        self.upgrade();
        if let Repr::Bitset { words, len } = &mut self.repr {
            match &other.repr {
                Repr::Array(rows) => {
                    for &row in rows {
                        if set_bit(words, row) {
                            *len += 1;
                        }
                    }
                }
                Repr::Bitset { words: other, .. } => {
                    if words.len() < other.len() {
                        words.resize(other.len(), 0);
                    }
                    for (w, o) in words.iter_mut().zip(other.iter()) {
                        *w |= *o;
                    }
                    *len = count_bits(words);
                }
            }
        }
    }

    /// In-place intersection
    ///
    /// The result may downgrade to the array form when the other side is an
    /// array, since the intersection can be no larger than it.
    pub fn intersect_with(&mut self, other: &RowIdSet) {
        let repr = match (&self.repr, &other.repr) {
            (Repr::Array(left), _) => {
                Repr::Array(left.iter().copied().filter(|&r| other.contains(r)).collect())
            }
            (Repr::Bitset { words, .. }, Repr::Array(right)) => Repr::Array(
                right
                    .iter()
                    .copied()
                    .filter(|&r| bit_is_set(words, r))
                    .collect(),
            ),
            (Repr::Bitset { words, .. }, Repr::Bitset { words: other, .. }) => {
                let anded: Vec<u64> = words.iter().zip(other.iter()).map(|(a, b)| a & b).collect();
                let len = count_bits(&anded);
                Repr::Bitset { words: anded, len }
            }
        };
        self.repr = repr;
    }

    /// Sorted row indices
    pub fn to_sorted_vec(&self) -> Vec<u32> {
        match &self.repr {
            Repr::Array(rows) => rows.clone(),
            Repr::Bitset { words, len } => {
                let mut out = Vec::with_capacity(*len);
                for (i, &word) in words.iter().enumerate() {
                    let mut w = word;
                    while w != 0 {
                        let bit = w.trailing_zeros();
                        out.push((i as u32) * 64 + bit);
                        w &= w - 1;
                    }
                }
                out
            }
        }
    }

    fn maybe_upgrade(&mut self) {
        if let Repr::Array(rows) = &self.repr {
            if rows.len() > self.threshold {
                self.upgrade();
            }
        }
    }

    fn upgrade(&mut self) {
        if let Repr::Array(rows) = &self.repr {
            let mut words = Vec::new();
            for &row in rows {
                set_bit(&mut words, row);
            }
            self.repr = Repr::Bitset {
                words,
                len: rows.len(),
            };
        }
    }
}

#[inline]
fn bit_is_set(words: &[u64], row: u32) -> bool {
    let word = (row / 64) as usize;
    word < words.len() && words[word] & (1u64 << (row % 64)) != 0
}

#[inline]
fn set_bit(words: &mut Vec<u64>, row: u32) -> bool {
    let word = (row / 64) as usize;
    if word >= words.len() {
        words.resize(word + 1, 0);
    }
    let mask = 1u64 << (row % 64);
    let added = words[word] & mask == 0;
    words[word] |= mask;
    added
}

fn count_bits(words: &[u64]) -> usize {
    words.iter().map(|w| w.count_ones() as usize).sum()
}

fn merge_union(left: &[u32], right: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            std::cmp::Ordering::Less => {
                out.push(left[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(right[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(left[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&left[i..]);
    out.extend_from_slice(&right[j..]);
    out
}
