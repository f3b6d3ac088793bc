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

//! Index keys
//!
//! A key is one [`KeyPart`] per indexed column. Parts order numerically for
//! int/long-backed columns (including the sortable float encodings) and
//! lexicographically for strings. `Min` and `Max` sentinels sort below and
//! above every real value and fill the unconstrained tail of a composite
//! range probe.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::core::StorageValue;

/// One column's contribution to an index key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Min,
    Long(i64),
    Str(Arc<str>),
    Max,
}

impl KeyPart {
    /// Key part for a stored value; nulls are never indexed
    pub fn from_storage(value: &StorageValue) -> Option<KeyPart> {
        match value {
            StorageValue::Null => None,
            StorageValue::Int(v) => Some(KeyPart::Long(*v as i64)),
            StorageValue::Long(v) => Some(KeyPart::Long(*v)),
            StorageValue::Str(s) => Some(KeyPart::Str(Arc::clone(s))),
        }
    }

    /// String payload, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeyPart::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Ordered tuple of key parts
///
/// Comparison is lexicographic; a shorter key that is a prefix of a longer
/// one compares as less.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey(pub SmallVec<[KeyPart; 2]>);

impl IndexKey {
    /// Single-column key
    pub fn single(part: KeyPart) -> Self {
        let mut parts = SmallVec::new();
        parts.push(part);
        IndexKey(parts)
    }

    /// Key from several parts
    pub fn from_parts(parts: impl IntoIterator<Item = KeyPart>) -> Self {
        IndexKey(parts.into_iter().collect())
    }

    /// Key for stored values; `None` if any of them is null
    pub fn from_storage(values: &[StorageValue]) -> Option<Self> {
        values
            .iter()
            .map(KeyPart::from_storage)
            .collect::<Option<SmallVec<[KeyPart; 2]>>>()
            .map(IndexKey)
    }

    /// Number of parts
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the empty key
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First part
    pub fn first(&self) -> Option<&KeyPart> {
        self.0.first()
    }
}
