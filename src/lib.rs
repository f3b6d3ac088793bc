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

//! # Memris - Embedded in-memory columnar store
//!
//! Memris keeps entities in typed column arrays and answers repository-style
//! queries over them without blocking writers. Readers observe rows through
//! an optimistic seqlock and generation-tagged row references, so a row
//! deleted and reused mid-query is never returned as if it were still live.
//!
//! ## Key Features
//!
//! - **Compiled conditions** - Type handlers resolved once per condition, not per call
//! - **Index-aware dispatch** - Composite, hash, range, prefix and suffix indexes, with scan fallback
//! - **Type-specialized sorting** - Nulls last, deterministic ties, bounded top-K
//! - **Joins** - Many-to-one, one-to-many and many-to-many resolution
//! - **Grouping and projection** - DISTINCT, GROUP BY with count HAVING, FK navigation
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use memris::executor::{CompiledCondition, CompiledQuery, OpCode, OrderBy};
//! use memris::{
//!     ColumnarTable, Config, Operator, RepositoryRuntime, SchemaBuilder, TableIndexes, TypeCode,
//!     TypeHandlerRegistry, Value,
//! };
//!
//! let schema = SchemaBuilder::new("Person")
//!     .add_id("id", TypeCode::Long)
//!     .add("age", TypeCode::Int)
//!     .build()
//!     .unwrap();
//! let table = Arc::new(ColumnarTable::new(schema.clone(), Config::small().table));
//! let people = RepositoryRuntime::new(
//!     table,
//!     schema,
//!     TableIndexes::default(),
//!     Arc::new(TypeHandlerRegistry::with_defaults()),
//!     Config::small(),
//! )
//! .unwrap();
//!
//! for age in [20, 30, 40] {
//!     people.save(vec![Value::Null, Value::Int(age)]).unwrap();
//! }
//!
//! let oldest = CompiledQuery::builder(OpCode::Find)
//!     .condition(CompiledCondition::new(1, TypeCode::Int, Operator::Gte, 0))
//!     .order_by(OrderBy::desc(1))
//!     .limit(1)
//!     .build()
//!     .unwrap();
//! let prepared = people.prepare(oldest).unwrap();
//! let rows = people.execute(&prepared, &[Value::Int(30)]).unwrap().into_rows();
//! assert_eq!(rows[0][0], Value::Long(3));
//! ```
//!
//! ## Modules
//!
//! - [`core`] - Core types ([`TypeCode`], [`Value`], [`RowRef`], [`Schema`], [`Error`])
//! - [`storage`] - Table and index collaborators, [`Selection`], configuration
//! - [`executor`] - Condition compilation, dispatch, sorting, joins, runtime
//! - [`common`] - Utilities (hash maps, row id sets, sortable float encoding)

pub mod common;
pub mod core;
pub mod executor;
pub mod storage;

// Re-export main types for convenience
pub use core::{
    Combinator, Error, IndexKind, JoinType, Operator, Result, Row, RowRef, Schema, SchemaBuilder,
    SchemaColumn, StorageValue, TypeCode, Value,
};

// Re-export common utilities
pub use common::RowIdSet;

// Re-export storage types
pub use storage::{
    ColumnarTable, Config, GeneratedTable, Index, IndexPlan, Selection, TableConfig, TableIndexes,
};

// Re-export executor types
pub use executor::{
    CompiledQuery, QueryResult, RepositoryRuntime, TypeHandler, TypeHandlerRegistry,
};
