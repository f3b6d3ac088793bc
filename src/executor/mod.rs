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

//! Query executor
//!
//! This module turns compiled queries into rows.
//!
//! # Architecture
//!
//! ```text
//! CompiledCondition ──▶ ConditionProgram (TypeHandler resolved once)
//!                              │
//!                              ▼
//! ConditionSet ──▶ Dispatcher: composite probe │ single index │ scan
//!                              │ + residual RowEvaluators
//!                              ▼
//!                          Selection
//!                              │
//!            joins ─▶ sort / top-K ─▶ materialize ─▶ QueryResult
//! ```
//!
//! # Components
//!
//! - [`TypeHandlerRegistry`] - Type-code indexed operator dispatch
//! - [`ConditionProgram`] - Compiled condition with direct executor and row evaluator
//! - [`Dispatcher`] - Index selection per AND-group, union of OR-groups
//! - [`sort_rows`] / [`top_k`] - Type-specialized ordering
//! - [`ManyToOne`] / [`Membership`] - Join resolution
//! - [`RepositoryRuntime`] - Per-repository orchestration of all of the above

pub mod composite;
pub mod condition;
pub mod decoders;
pub mod dispatch;
pub mod handlers;
pub mod join;
pub mod materialize;
pub mod pattern;
pub mod predicate;
pub mod query;
pub mod runtime;
pub mod sort;

pub use composite::{probe_composite, CompositeProbe};
pub use condition::{matches_all, CompiledCondition, ConditionProgram, DirectExecutor, RowEvaluator};
pub use decoders::ConditionValue;
pub use dispatch::{ConditionSet, Dispatcher};
pub use handlers::{
    FloatingHandler, NumericHandler, StringHandler, TypeHandler, TypeHandlerRegistry,
};
pub use join::{CollectionKind, JoinPlan, JoinTable, JoinedRow, ManyToOne, Membership};
pub use materialize::{
    materialize_live, EntityMaterializer, EntitySaver, MaterializerCache, RowMaterializer,
    ShapeKey,
};
pub use pattern::StringPattern;
pub use predicate::{ColumnPredicate, FloatClass};
pub use query::{
    Assignment, Cardinality, CompiledQuery, GroupValue, GroupValueKind, Grouping, Having,
    JoinClause, OpCode, ProjectionItem, ProjectionStep, QueryBuilder, QueryResult, ReturnKind,
};
pub use runtime::{PreparedQuery, RepositoryRuntime};
pub use sort::{order_and_page, sort_rows, top_k, OrderBy};
