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

//! Core types and definitions for Memris
//!
//! This module contains the fundamental types used throughout the engine:
//!
//! - [`TypeCode`] - One-byte logical column types
//! - [`Operator`] - Condition operators (EQ, BETWEEN, IN, STARTING_WITH, ...)
//! - [`Value`] - Runtime values with type information
//! - [`RowRef`] - Generation-tagged row references
//! - [`Schema`] - Entity column layout
//! - [`Error`] - Error types for all engine operations

pub mod error;
pub mod row_ref;
pub mod schema;
pub mod types;
pub mod value;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use row_ref::RowRef;
pub use schema::{Schema, SchemaBuilder, SchemaColumn};
pub use types::{Combinator, IndexKind, JoinType, Operator, StorageKind, TypeCode};
pub use value::{epoch_day, StorageValue, Value};

/// A materialized row: one value per column
pub type Row = Vec<Value>;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_schema_value_integration() {
        let schema = SchemaBuilder::new("Product")
            .add_id("id", TypeCode::Long)
            .add("price", TypeCode::Double)
            .add_nullable("name", TypeCode::String)
            .build()
            .unwrap();

        let row: Row = vec![Value::Long(1), Value::Double(9.99), Value::Null];
        for (col, value) in schema.columns.iter().zip(&row) {
            let stored = value.to_storage(col.type_code).unwrap();
            if col.nullable {
                continue;
            }
            assert!(!stored.is_null(), "{} must be present", col.name);
        }
    }
}
