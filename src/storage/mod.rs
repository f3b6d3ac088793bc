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

//! Storage layer for Memris
//!
//! This module contains the storage collaborators the query engine reads:
//! - The [`GeneratedTable`] and [`Index`] traits
//! - [`Selection`], the canonical sorted set of row references
//! - The reference [`ColumnarTable`]
//! - Secondary index structures
//! - Configuration types

pub mod columnar;
pub mod config;
pub mod index;
pub mod selection;
pub mod traits;

// Re-export main types
pub use columnar::ColumnarTable;
pub use config::{Config, TableConfig};
pub use index::{
    HashIndex, IndexKey, IndexPlan, KeyPart, PrefixIndex, RangeIndex, SuffixIndex, TableIndexes,
};
pub use selection::Selection;
pub use traits::{GeneratedTable, Index};
