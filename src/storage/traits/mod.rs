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

//! Storage traits for Memris
//!
//! This module defines the collaborator interfaces consumed by the engine:
//!
//! - [`GeneratedTable`] - Columnar table with seqlock reads and row lifecycle
//! - [`Index`] - Secondary index operations (equality, range, prefix, suffix)
//!

pub mod index_trait;
pub mod table;

// Re-export main traits
pub use index_trait::Index;
pub use table::GeneratedTable;
