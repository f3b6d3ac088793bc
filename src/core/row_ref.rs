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

//! Generation-tagged row references
//!
//! A [`RowRef`] packs `(generation << 32) | row_index` into a single `u64`.
//! A reference is live only while the table's generation for that slot still
//! equals the packed generation; a tombstoned and reused slot carries a newer
//! generation, so stale references can never resolve to the new occupant.

use std::cmp::Ordering;
use std::fmt;

/// Packed (row index, generation) pair
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowRef(u64);

impl RowRef {
    /// Pack a row index and a generation
    #[inline]
    pub const fn pack(row_index: u32, generation: u32) -> Self {
        RowRef(((generation as u64) << 32) | row_index as u64)
    }

    /// Rebuild a reference from its packed form
    #[inline]
    pub const fn from_packed(packed: u64) -> Self {
        RowRef(packed)
    }

    /// Packed representation
    #[inline]
    pub const fn packed(self) -> u64 {
        self.0
    }

    /// Row slot index
    #[inline]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Generation captured when the reference was created
    #[inline]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Sort key ordering references by slot first, then generation
    #[inline]
    pub const fn scan_order_key(self) -> u64 {
        ((self.index() as u64) << 32) | self.generation() as u64
    }
}

impl Ord for RowRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.scan_order_key().cmp(&other.scan_order_key())
    }
}

impl PartialOrd for RowRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowRef({}@{})", self.index(), self.generation())
    }
}
