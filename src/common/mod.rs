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

//! Common utilities for Memris
//!
//! This module contains shared utilities used throughout the engine:
//!
//! - [`float_encoding`] - Order-preserving float/int encodings
//! - [`maps`] - Hash map aliases for row and key lookups
//! - [`row_id_set`] - Hybrid sorted-array/bitset set of row indices

pub mod float_encoding;
pub mod maps;
pub mod row_id_set;

// Re-export main types for convenience
pub use float_encoding::{
    double_to_sortable_long, float_to_sortable_int, sortable_int_to_float,
    sortable_long_to_double,
};
pub use maps::{
    new_concurrent_map, new_index_map, ConcurrentMap, FxBuildHasher, FxHashMap, FxHashSet,
    IndexMap,
};
pub use row_id_set::{RowIdSet, DEFAULT_BITSET_THRESHOLD};
