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

//! Repository runtime
//!
//! [`RepositoryRuntime`] owns everything one entity repository needs: its
//! table, schema, indexes, type handlers and materializer. A
//! [`CompiledQuery`] is prepared once into a [`PreparedQuery`] (conditions
//! compiled, related repositories resolved) and then executed any number of
//! times, from any number of threads.
//!
//! Execution of a find:
//!
//! ```text
//! Dispatcher::select  (AND-groups: lead + residual, OR-groups unioned)
//!   ↓
//! joins               (source rows filtered by related targets)
//!   ↓
//! order / top-K / page
//!   ↓
//! materialize or project under the seqlock, dropping dead rows
//!   ↓
//! DISTINCT / grouping / return shape
//! ```

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::core::{Error, Result, Row, RowRef, Schema, StorageValue, TypeCode, Value};
use crate::executor::dispatch::{ConditionSet, Dispatcher};
use crate::executor::handlers::TypeHandlerRegistry;
use crate::executor::join::{coerce, collect, hydrate_rows, read_live, ManyToOne, Membership};
use crate::executor::materialize::{materialize_live, EntitySaver, MaterializerCache, RowMaterializer};
use crate::executor::query::{
    Cardinality, CompiledQuery, GroupValue, GroupValueKind, JoinClause, OpCode, QueryResult,
    ReturnKind,
};
use crate::executor::sort::{order_and_page, sort_rows};
use crate::storage::{Config, GeneratedTable, Selection, TableIndexes};

/// Join clause with its related repositories resolved
struct PreparedJoin {
    clause: JoinClause,
    target: Arc<RepositoryRuntime>,
    join_table: Option<Arc<RepositoryRuntime>>,
    conditions: ConditionSet,
}

/// Projection path with its related repositories resolved
struct PreparedProjection {
    path: Vec<(usize, Arc<RepositoryRuntime>)>,
    column: usize,
}

/// A query bound to one repository, ready to execute
pub struct PreparedQuery {
    query: CompiledQuery,
    conditions: ConditionSet,
    joins: Vec<PreparedJoin>,
    projection: Vec<PreparedProjection>,
}

impl PreparedQuery {
    pub fn query(&self) -> &CompiledQuery {
        &self.query
    }

    pub fn conditions(&self) -> &ConditionSet {
        &self.conditions
    }
}

/// Per-execution join state
struct JoinState {
    filter: Option<Selection>,
    membership: Option<Membership>,
}

/// Runtime of one entity repository
pub struct RepositoryRuntime {
    table: Arc<dyn GeneratedTable>,
    schema: Arc<Schema>,
    indexes: TableIndexes,
    registry: Arc<TypeHandlerRegistry>,
    config: Config,
    materializer: RowMaterializer,
    related: FxHashMap<String, Arc<RepositoryRuntime>>,
    next_id: AtomicI64,
}

impl RepositoryRuntime {
    /// Create a runtime over `table`, whose layout must match `schema`
    pub fn new(
        table: Arc<dyn GeneratedTable>,
        schema: Schema,
        indexes: TableIndexes,
        registry: Arc<TypeHandlerRegistry>,
        config: Config,
    ) -> Result<Self> {
        if schema.column_count() != table.column_count() {
            return Err(Error::invalid_argument(format!(
                "schema of {} has {} columns but its table has {}",
                schema.entity_name,
                schema.column_count(),
                table.column_count()
            )));
        }
        indexes.validate(&schema)?;
        let materializer = MaterializerCache::new().row_materializer(&schema);
        let next_id = AtomicI64::new(max_numeric_id(table.as_ref()).saturating_add(1));
        Ok(Self {
            table,
            schema: Arc::new(schema),
            indexes,
            registry,
            config,
            materializer,
            related: FxHashMap::default(),
            next_id,
        })
    }

    /// Builder method to share compiled materializers with other repositories
    pub fn with_materializers(mut self, cache: &MaterializerCache) -> Self {
        self.materializer = cache.row_materializer(&self.schema);
        self
    }

    /// Builder method to register a repository reachable by joins and
    /// projections under `name`
    pub fn with_related(mut self, name: impl Into<String>, runtime: Arc<RepositoryRuntime>) -> Self {
        self.related.insert(name.into(), runtime);
        self
    }

    pub fn name(&self) -> &str {
        &self.schema.entity_name
    }

    pub fn table(&self) -> &dyn GeneratedTable {
        self.table.as_ref()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn indexes(&self) -> &TableIndexes {
        &self.indexes
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn materializer(&self) -> &RowMaterializer {
        &self.materializer
    }

    fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher::new(self.table.as_ref(), &self.indexes, self.config.bitset_threshold)
    }

    fn related(&self, name: &str) -> Result<Arc<RepositoryRuntime>> {
        self.related.get(name).cloned().ok_or_else(|| {
            Error::MissingConfiguration(format!(
                "{} has no related repository named {}",
                self.name(),
                name
            ))
        })
    }

    // =========================================================================
    // Preparation
    // =========================================================================

    /// Compile a query against this repository
    pub fn prepare(&self, query: CompiledQuery) -> Result<Arc<PreparedQuery>> {
        let conditions = ConditionSet::compile(&query.conditions, &self.registry, &self.schema)?;
        for order in &query.order_by {
            self.schema.column(order.column)?;
        }
        if let Some(grouping) = &query.grouping {
            for &column in &grouping.key_columns {
                self.schema.column(column)?;
            }
        }
        for assignment in &query.updates {
            self.schema.column(assignment.column)?;
        }

        let joins = query
            .joins
            .iter()
            .map(|clause| self.prepare_join(clause))
            .collect::<Result<Vec<_>>>()?;
        let projection = query
            .projection
            .iter()
            .map(|item| {
                let mut path = Vec::with_capacity(item.steps.len());
                let mut schema = Arc::clone(&self.schema);
                for step in &item.steps {
                    schema.column(step.fk_column)?;
                    let target = self.related(&step.target)?;
                    schema = Arc::clone(&target.schema);
                    path.push((step.fk_column, target));
                }
                schema.column(item.column)?;
                Ok(PreparedProjection {
                    path,
                    column: item.column,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "prepared {} on {}: {} conditions, {} joins",
            query.op,
            self.name(),
            query.conditions.len(),
            joins.len()
        );
        Ok(Arc::new(PreparedQuery {
            query,
            conditions,
            joins,
            projection,
        }))
    }

    fn prepare_join(&self, clause: &JoinClause) -> Result<PreparedJoin> {
        clause.plan.validate()?;
        let target = self.related(&clause.target)?;
        let conditions = ConditionSet::compile(&clause.conditions, &target.registry, &target.schema)?;
        let join_table = match (&clause.plan.join_table, clause.cardinality) {
            (Some(link), Cardinality::ManyToMany) => Some(self.related(&link.table)?),
            (None, Cardinality::ManyToMany) => {
                return Err(Error::MissingConfiguration(format!(
                    "many-to-many join onto {} has no join table",
                    clause.target
                )))
            }
            _ => None,
        };
        match clause.cardinality {
            Cardinality::ManyToOne => self.schema.column(clause.plan.source_column)?,
            Cardinality::OneToMany => target.schema.column(clause.plan.source_column)?,
            Cardinality::ManyToMany => self.schema.column(self.schema.id_column())?,
        };
        Ok(PreparedJoin {
            clause: clause.clone(),
            target,
            join_table,
            conditions,
        })
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Execute a prepared query with call-site arguments
    pub fn execute(&self, prepared: &PreparedQuery, args: &[Value]) -> Result<QueryResult> {
        let query = &prepared.query;
        let args = query.bind(args)?;
        trace!("executing {} on {}", query.op, self.name());
        match query.op {
            OpCode::FindById => {
                let id = first_arg(&args, query.op)?;
                Ok(QueryResult::Single(self.find_by_id(id)?))
            }
            OpCode::FindAll | OpCode::Find => {
                let (selection, joins) = self.select_joined(prepared, &args)?;
                self.finish_find(prepared, selection, &joins, &args)
            }
            OpCode::Count if prepared.joins.is_empty() => Ok(QueryResult::Count(
                self.dispatcher().count(&prepared.conditions, &args)?,
            )),
            OpCode::Count => Ok(QueryResult::Count(self.select_joined(prepared, &args)?.0.len())),
            OpCode::CountAll => Ok(QueryResult::Count(self.table.live_count())),
            OpCode::Exists if prepared.joins.is_empty() => Ok(QueryResult::Exists(
                self.dispatcher().exists(&prepared.conditions, &args)?,
            )),
            OpCode::Exists => Ok(QueryResult::Exists(
                !self.select_joined(prepared, &args)?.0.is_empty(),
            )),
            OpCode::ExistsById => {
                let id = first_arg(&args, query.op)?;
                Ok(QueryResult::Exists(self.row_of_id(id)?.is_some()))
            }
            OpCode::DeleteOne => {
                let entity = match first_arg(&args, query.op)? {
                    Value::List(values) => values,
                    other => {
                        return Err(Error::invalid_argument(format!(
                            "{} expects an entity row, got {}",
                            query.op,
                            other.type_name()
                        )))
                    }
                };
                let id = entity.get(self.schema.id_column()).ok_or_else(|| {
                    Error::column_out_of_bounds(self.schema.id_column(), entity.len())
                })?;
                Ok(QueryResult::Modified(self.delete_by_id(id)? as usize))
            }
            OpCode::DeleteById => {
                let id = first_arg(&args, query.op)?;
                Ok(QueryResult::Modified(self.delete_by_id(id)? as usize))
            }
            OpCode::DeleteAllById => {
                let ids: Vec<Value> = match first_arg(&args, query.op)? {
                    Value::List(ids) => ids.to_vec(),
                    Value::Null => Vec::new(),
                    single => vec![single.clone()],
                };
                let mut deleted = 0;
                for id in &ids {
                    deleted += self.delete_by_id(id)? as usize;
                }
                Ok(QueryResult::Modified(deleted))
            }
            OpCode::DeleteAll => Ok(QueryResult::Modified(self.delete_rows(&Selection::all(self.table()))?)),
            OpCode::DeleteQuery => {
                let (selection, _) = self.select_joined(prepared, &args)?;
                Ok(QueryResult::Modified(self.delete_rows(&selection)?))
            }
            OpCode::UpdateQuery => self.update(prepared, &args),
        }
    }

    /// Rows matching a compiled condition set
    pub fn select(&self, conditions: &ConditionSet, args: &[Value]) -> Result<Selection> {
        self.dispatcher().select(conditions, args)
    }

    /// Materialize a selection in scan order, skipping rows deleted since
    pub fn materialize_selection(&self, selection: &Selection) -> Result<Vec<Row>> {
        let mut rows = Vec::with_capacity(selection.len());
        for row in selection.iter() {
            if let Some(values) = materialize_live(self.table(), row, &self.materializer)? {
                rows.push(values);
            }
        }
        Ok(rows)
    }

    fn select_joined(&self, prepared: &PreparedQuery, args: &[Value]) -> Result<(Selection, Vec<JoinState>)> {
        let mut selection = match prepared.query.op {
            OpCode::FindAll => Selection::all(self.table()),
            _ => self.select(&prepared.conditions, args)?,
        };
        let mut states = Vec::with_capacity(prepared.joins.len());
        for join in &prepared.joins {
            let (filtered, state) = self.apply_join(join, selection, args)?;
            selection = filtered;
            states.push(state);
        }
        Ok((selection, states))
    }

    fn apply_join(&self, join: &PreparedJoin, selection: Selection, args: &[Value]) -> Result<(Selection, JoinState)> {
        let plan = &join.clause.plan;
        let filter = if join.conditions.is_empty() {
            None
        } else {
            Some(join.target.select(&join.conditions, args)?)
        };
        let target = join.target.table();
        let mut membership = None;
        let kept = match join.clause.cardinality {
            _ if plan.is_left() => selection,
            Cardinality::ManyToOne => {
                let mut resolver = ManyToOne::new(self.table(), target, plan)?;
                match &filter {
                    Some(filter) => resolver.filter_source(&selection, filter),
                    None => Selection::from_refs(
                        resolver
                            .resolve(&selection, None)
                            .into_iter()
                            .map(|j| j.source)
                            .collect(),
                    ),
                }
            }
            Cardinality::OneToMany => selection.filter(|row| {
                let children = hydrate_rows(self.table(), row, target, plan.source_column);
                match &filter {
                    Some(filter) => !children.intersect(filter).is_empty(),
                    None => !children.is_empty(),
                }
            }),
            Cardinality::ManyToMany => {
                let built = self.membership(join, filter.as_ref())?;
                let kept = built.filter_source(self.table(), &selection);
                membership = Some(built);
                kept
            }
        };
        if membership.is_none() && join.clause.cardinality == Cardinality::ManyToMany && join.clause.fetch.is_some() {
            membership = Some(self.membership(join, filter.as_ref())?);
        }
        debug!(
            "{:?} join onto {} kept {} rows",
            join.clause.cardinality,
            join.target.name(),
            kept.len()
        );
        Ok((kept, JoinState { filter, membership }))
    }

    fn membership(&self, join: &PreparedJoin, filter: Option<&Selection>) -> Result<Membership> {
        let (Some(link), Some(join_table)) = (&join.clause.plan.join_table, &join.join_table) else {
            return Err(Error::internal("many-to-many join prepared without a join table"));
        };
        Ok(Membership::build(join_table.table(), link, join.target.table(), filter))
    }

    fn finish_find(
        &self,
        prepared: &PreparedQuery,
        selection: Selection,
        joins: &[JoinState],
        args: &[Value],
    ) -> Result<QueryResult> {
        let query = &prepared.query;
        if query.grouping.is_some() {
            return self.group(prepared, selection, args);
        }
        let dedupe = query.distinct || query.return_kind == ReturnKind::Set;
        let single = matches!(query.return_kind, ReturnKind::One | ReturnKind::Optional);
        let refs = selection.into_refs();

        let rows = if dedupe {
            let ordered = order_and_page(self.table(), &refs, &query.order_by, 0, None, &self.config);
            let mut seen: FxHashSet<Vec<StorageValue>> = FxHashSet::default();
            let mut rows = Vec::new();
            for row in ordered {
                if let Some(values) = self.shape_row(prepared, row)? {
                    if seen.insert(row_key(&values)) {
                        rows.push((row, values));
                    }
                }
            }
            rows.into_iter()
                .skip(query.offset)
                .take(query.limit.unwrap_or(usize::MAX))
                .collect::<Vec<_>>()
        } else {
            let limit = match query.limit {
                None if single => Some(1),
                limit => limit,
            };
            let ordered = order_and_page(self.table(), &refs, &query.order_by, query.offset, limit, &self.config);
            let mut rows = Vec::with_capacity(ordered.len());
            for row in ordered {
                if let Some(values) = self.shape_row(prepared, row)? {
                    rows.push((row, values));
                }
            }
            rows
        };

        let mut out = Vec::with_capacity(rows.len());
        for (row, mut values) in rows {
            self.fetch_joins(prepared, joins, row, &mut values)?;
            out.push(values);
        }
        Ok(match query.return_kind {
            ReturnKind::One | ReturnKind::Optional => QueryResult::Single(out.into_iter().next()),
            ReturnKind::Set => QueryResult::Set(out),
            _ => QueryResult::List(out),
        })
    }

    /// Projected or materialized row; `None` once the row is dead
    fn shape_row(&self, prepared: &PreparedQuery, row: RowRef) -> Result<Option<Row>> {
        if prepared.projection.is_empty() {
            return materialize_live(self.table(), row, &self.materializer);
        }
        if !self.table.is_live(row) {
            return Ok(None);
        }
        prepared
            .projection
            .iter()
            .map(|item| self.navigate(item, row))
            .collect::<Result<Row>>()
            .map(Some)
    }

    fn navigate(&self, item: &PreparedProjection, row: RowRef) -> Result<Value> {
        let mut runtime: &RepositoryRuntime = self;
        let mut current = row;
        for (fk_column, target) in &item.path {
            let Some(fk) = read_live(runtime.table(), current, *fk_column) else {
                return Ok(Value::Null);
            };
            let Some(next) = target.row_of_stored_id(&fk) else {
                return Ok(Value::Null);
            };
            runtime = target.as_ref();
            current = next;
        }
        runtime.read_value(current, item.column)
    }

    /// One cell of a live row as a logical value; `Null` once dead
    fn read_value(&self, row: RowRef, column: usize) -> Result<Value> {
        let table = self.table();
        let mut value = None;
        table.read_with_seqlock(row.index(), &mut || {
            value = table
                .is_live(row)
                .then(|| self.materializer.read_column(table, column, row.index()));
        });
        Ok(value.transpose()?.unwrap_or(Value::Null))
    }

    fn fetch_joins(&self, prepared: &PreparedQuery, joins: &[JoinState], row: RowRef, values: &mut Row) -> Result<()> {
        for (join, state) in prepared.joins.iter().zip(joins) {
            let Some(kind) = join.clause.fetch else {
                continue;
            };
            let target = join.target.table();
            let materializer = &join.target.materializer;
            let fetched = match join.clause.cardinality {
                Cardinality::ManyToOne => {
                    let mut resolver = ManyToOne::new(self.table(), target, &join.clause.plan)?;
                    let found = resolver
                        .target_of(row)
                        .filter(|t| state.filter.as_ref().map_or(true, |f| f.contains(*t)));
                    match found {
                        Some(t) => materialize_live(target, t, materializer)?.map_or(Value::Null, Value::list),
                        None => Value::Null,
                    }
                }
                Cardinality::OneToMany => {
                    let mut children = hydrate_rows(self.table(), row, target, join.clause.plan.source_column);
                    if let Some(filter) = &state.filter {
                        children = children.intersect(filter);
                    }
                    rows_value(collect(target, children.iter(), materializer, kind)?)
                }
                Cardinality::ManyToMany => match &state.membership {
                    Some(membership) => {
                        rows_value(membership.hydrate(self.table(), row, target, materializer, kind)?)
                    }
                    None => Value::Null,
                },
            };
            values.push(fetched);
        }
        Ok(())
    }

    fn group(&self, prepared: &PreparedQuery, selection: Selection, args: &[Value]) -> Result<QueryResult> {
        let query = &prepared.query;
        let Some(grouping) = &query.grouping else {
            return Err(Error::internal("grouped execution without a grouping"));
        };
        let refs = selection.into_refs();
        let ordered = if query.order_by.is_empty() {
            refs
        } else {
            sort_rows(self.table(), &refs, &query.order_by, &self.config)
        };

        let mut positions: FxHashMap<Vec<StorageValue>, usize> = FxHashMap::default();
        let mut groups: Vec<(Row, Vec<Row>, usize)> = Vec::new();
        let mut seen: Vec<FxHashSet<Vec<StorageValue>>> = Vec::new();
        for row in ordered {
            let Some(full) = materialize_live(self.table(), row, &self.materializer)? else {
                continue;
            };
            let key: Row = grouping.key_columns.iter().map(|&c| full[c].clone()).collect();
            let slot = *positions.entry(row_key(&key)).or_insert_with(|| {
                groups.push((key, Vec::new(), 0));
                seen.push(FxHashSet::default());
                groups.len() - 1
            });
            let group = &mut groups[slot];
            group.2 += 1;
            match grouping.value {
                GroupValueKind::Count => {}
                GroupValueKind::List => group.1.push(self.group_member(prepared, row, full)?),
                GroupValueKind::Set => {
                    let member = self.group_member(prepared, row, full)?;
                    if seen[slot].insert(row_key(&member)) {
                        group.1.push(member);
                    }
                }
            }
        }

        let mut result = Vec::with_capacity(groups.len());
        for (key, members, count) in groups {
            let value = match grouping.value {
                GroupValueKind::Count => {
                    if let Some(having) = &grouping.having {
                        if !having.accepts(count, args)? {
                            continue;
                        }
                    }
                    GroupValue::Count(count)
                }
                GroupValueKind::List => GroupValue::List(members),
                GroupValueKind::Set => GroupValue::Set(members),
            };
            result.push((key, value));
        }
        debug!("grouping on {} produced {} groups", self.name(), result.len());
        Ok(QueryResult::Grouped(
            result
                .into_iter()
                .skip(query.offset)
                .take(query.limit.unwrap_or(usize::MAX))
                .collect(),
        ))
    }

    fn group_member(&self, prepared: &PreparedQuery, row: RowRef, full: Row) -> Result<Row> {
        if prepared.projection.is_empty() {
            return Ok(full);
        }
        prepared
            .projection
            .iter()
            .map(|item| self.navigate(item, row))
            .collect()
    }

    // =========================================================================
    // Id access
    // =========================================================================

    fn id_type(&self) -> TypeCode {
        self.table.type_code_at(self.schema.id_column())
    }

    fn row_of_id(&self, id: &Value) -> Result<Option<RowRef>> {
        if id.is_null() {
            return Ok(None);
        }
        let stored = id.to_storage(self.id_type())?;
        Ok(self.table.lookup_id(&stored))
    }

    fn row_of_stored_id(&self, id: &StorageValue) -> Option<RowRef> {
        coerce(id, self.id_type().storage_kind()).and_then(|id| self.table.lookup_id(&id))
    }

    /// The entity with `id`, if live
    pub fn find_by_id(&self, id: &Value) -> Result<Option<Row>> {
        match self.row_of_id(id)? {
            Some(row) => materialize_live(self.table(), row, &self.materializer),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert `entity`, or replace the live entity with the same id
    ///
    /// A null id is generated. Returns the entity carrying its id. A rejected
    /// entity leaves the stored one untouched.
    pub fn save(&self, entity: Row) -> Result<Row> {
        let mut values = self.materializer.to_values(&entity)?;
        let id_column = self.schema.id_column();
        if values[id_column].is_null() {
            values[id_column] = self.generate_id()?;
        }
        let id = values[id_column].clone();
        let stored = self.schema.to_storage_row(&values)?;
        if let Some(n) = numeric_id(&stored[id_column]) {
            self.next_id.fetch_max(n.saturating_add(1), Ordering::Relaxed);
        }

        let replaced = match self.table.lookup_id(&stored[id_column]) {
            Some(existing) => {
                trace!("save on {} replaces id {:?}", self.name(), stored[id_column]);
                let previous: Option<Row> =
                    materialize_live(self.table(), existing, &self.materializer)?;
                self.indexes.on_delete(self.table(), existing)?;
                self.table.tombstone(existing);
                previous
            }
            None => None,
        };
        let row = match self.table.insert_from(&values) {
            Ok(row) => row,
            Err(err) => {
                if let Some(previous) = replaced {
                    let restored = self.table.insert_from(&previous)?;
                    self.indexes.on_insert(self.table(), restored)?;
                }
                return Err(err);
            }
        };
        self.indexes.on_insert(self.table(), row)?;
        self.materializer.with_id(entity, id)
    }

    /// Save every entity in order
    pub fn save_all(&self, entities: Vec<Row>) -> Result<Vec<Row>> {
        entities.into_iter().map(|e| self.save(e)).collect()
    }

    /// Next id from the sequence that no live row holds yet
    fn generate_id(&self) -> Result<Value> {
        loop {
            let n = self.next_id.fetch_add(1, Ordering::Relaxed);
            let id = match self.id_type() {
                TypeCode::Long => Value::Long(n),
                TypeCode::Int => i32::try_from(n).map(Value::Int).map_err(|_| {
                    Error::CapacityExceeded {
                        capacity: i32::MAX as usize,
                    }
                })?,
                TypeCode::String => Value::text(n.to_string()),
                other => {
                    return Err(Error::not_supported(format!(
                        "ids of type {} cannot be generated",
                        other
                    )))
                }
            };
            let stored = id.to_storage(self.id_type())?;
            if self.table.lookup_id(&stored).is_none() {
                return Ok(id);
            }
            trace!("generated id {:?} is taken on {}", stored, self.name());
        }
    }

    /// Delete the entity with `id`; false if there was none
    pub fn delete_by_id(&self, id: &Value) -> Result<bool> {
        match self.row_of_id(id)? {
            Some(row) => self.delete_row(row),
            None => Ok(false),
        }
    }

    fn delete_row(&self, row: RowRef) -> Result<bool> {
        if !self.table.is_live(row) {
            return Ok(false);
        }
        self.indexes.on_delete(self.table(), row)?;
        Ok(self.table.tombstone(row))
    }

    fn delete_rows(&self, selection: &Selection) -> Result<usize> {
        let mut deleted = 0;
        for row in selection.iter() {
            deleted += self.delete_row(row)? as usize;
        }
        debug!("deleted {} rows from {}", deleted, self.name());
        Ok(deleted)
    }

    fn update(&self, prepared: &PreparedQuery, args: &[Value]) -> Result<QueryResult> {
        // Every assignment is checked before the first row changes
        let mut assignments = Vec::with_capacity(prepared.query.updates.len());
        for assignment in &prepared.query.updates {
            let column = self.schema.column(assignment.column)?;
            if column.primary_key {
                return Err(Error::not_supported(format!(
                    "cannot assign the id column {}.{}",
                    self.name(),
                    column.name
                )));
            }
            let value = args.get(assignment.arg_index).ok_or_else(|| {
                Error::invalid_argument(format!(
                    "SET {} expects argument {} but only {} were passed",
                    column.name,
                    assignment.arg_index,
                    args.len()
                ))
            })?;
            if value.is_null() && !column.nullable {
                return Err(Error::invalid_argument(format!(
                    "cannot assign null to non-nullable column {}.{}",
                    self.name(),
                    column.name
                )));
            }
            value.to_storage(column.type_code)?;
            assignments.push((assignment.column, value.clone()));
        }

        let (selection, _) = self.select_joined(prepared, args)?;
        let mut updated = 0;
        for row in selection.iter() {
            let Some(mut values) = materialize_live(self.table(), row, &self.materializer)? else {
                continue;
            };
            for (column, value) in &assignments {
                values[*column] = value.clone();
            }
            self.indexes.on_delete(self.table(), row)?;
            if !self.table.tombstone(row) {
                continue;
            }
            let replacement = self.table.insert_from(&values)?;
            self.indexes.on_insert(self.table(), replacement)?;
            updated += 1;
        }
        debug!("updated {} rows of {}", updated, self.name());
        Ok(QueryResult::Modified(updated))
    }
}

fn first_arg(args: &[Value], op: OpCode) -> Result<&Value> {
    args.first()
        .ok_or_else(|| Error::invalid_argument(format!("{} needs an argument", op)))
}

fn row_key(row: &[Value]) -> Vec<StorageValue> {
    row.iter().map(Value::key).collect()
}

fn rows_value(rows: Vec<Row>) -> Value {
    Value::list(rows.into_iter().map(Value::list))
}

/// Numeric value of an id; string ids count when they parse as integers
fn numeric_id(id: &StorageValue) -> Option<i64> {
    match id {
        StorageValue::Str(s) => s.trim().parse().ok(),
        other => other.as_i64(),
    }
}

fn max_numeric_id(table: &dyn GeneratedTable) -> i64 {
    let id_column = table.id_column();
    table
        .scan_all()
        .into_iter()
        .filter_map(|row| numeric_id(&table.read_storage(id_column, row)))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{IndexKind, JoinType, Operator, SchemaBuilder};
    use crate::executor::condition::CompiledCondition;
    use crate::executor::join::{CollectionKind, JoinPlan, JoinTable};
    use crate::executor::query::{Grouping, ProjectionItem};
    use crate::executor::sort::OrderBy;
    use crate::storage::{ColumnarTable, IndexPlan};

    fn setup_runtime(schema: Schema, plans: &[IndexPlan]) -> RepositoryRuntime {
        let table = Arc::new(ColumnarTable::new(schema.clone(), Config::small().table));
        RepositoryRuntime::new(
            table,
            schema,
            TableIndexes::new(plans).unwrap(),
            Arc::new(TypeHandlerRegistry::with_defaults()),
            Config::small(),
        )
        .unwrap()
    }

    fn setup_people() -> RepositoryRuntime {
        let schema = SchemaBuilder::new("Person")
            .add_id("id", TypeCode::Long)
            .add("age", TypeCode::Int)
            .add_nullable("city", TypeCode::String)
            .add_nullable("employer_id", TypeCode::Long)
            .build()
            .unwrap();
        let runtime = setup_runtime(schema, &[IndexPlan::new("idx_age", IndexKind::Range, vec![1])]);
        let people = [
            (20, Some("Oslo"), Some(1)),
            (30, Some("Rome"), Some(2)),
            (40, Some("Oslo"), None),
            (30, None, Some(1)),
        ];
        for (age, city, employer) in people {
            runtime
                .save(vec![
                    Value::Null,
                    Value::Int(age),
                    city.map(Value::text).unwrap_or(Value::Null),
                    employer.map(Value::Long).unwrap_or(Value::Null),
                ])
                .unwrap();
        }
        runtime
    }

    fn setup_companies() -> Arc<RepositoryRuntime> {
        let schema = SchemaBuilder::new("Company")
            .add_id("id", TypeCode::Long)
            .add("name", TypeCode::String)
            .build()
            .unwrap();
        let runtime = setup_runtime(schema, &[]);
        runtime.save(vec![Value::Long(1), Value::text("Acme")]).unwrap();
        runtime.save(vec![Value::Long(2), Value::text("Initech")]).unwrap();
        Arc::new(runtime)
    }

    fn ids(rows: &[Row]) -> Vec<i64> {
        rows.iter().map(|r| r[0].as_integral().unwrap()).collect()
    }

    fn age(op: Operator, arg: usize) -> CompiledCondition {
        CompiledCondition::new(1, TypeCode::Int, op, arg)
    }

    fn run(runtime: &RepositoryRuntime, query: CompiledQuery, args: &[Value]) -> QueryResult {
        let prepared = runtime.prepare(query).unwrap();
        runtime.execute(&prepared, args).unwrap()
    }

    #[test]
    fn test_save_generates_ids() {
        let runtime = setup_people();
        assert_eq!(runtime.table().live_count(), 4);
        let saved = runtime
            .save(vec![Value::Null, Value::Int(50), Value::Null, Value::Null])
            .unwrap();
        assert_eq!(saved[0], Value::Long(5));

        let replaced = runtime
            .save(vec![Value::Long(5), Value::Int(51), Value::Null, Value::Null])
            .unwrap();
        assert_eq!(replaced[0], Value::Long(5));
        assert_eq!(runtime.table().live_count(), 5);
        assert_eq!(runtime.find_by_id(&Value::Long(5)).unwrap().unwrap()[1], Value::Int(51));
    }

    #[test]
    fn test_generated_id_skips_taken_ids() {
        let runtime = setup_people();
        runtime.next_id.store(2, Ordering::Relaxed);
        let saved = runtime
            .save(vec![Value::Null, Value::Int(60), Value::Null, Value::Null])
            .unwrap();
        assert_eq!(saved[0], Value::Long(5));
        assert_eq!(runtime.table().live_count(), 5);
        assert_eq!(runtime.find_by_id(&Value::Long(2)).unwrap().unwrap()[1], Value::Int(30));
    }

    #[test]
    fn test_failed_replace_restores_row() {
        let runtime = setup_people();
        let err = runtime
            .save(vec![Value::Long(1), Value::Null, Value::Null, Value::Null])
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(runtime.table().live_count(), 4);
        assert_eq!(runtime.find_by_id(&Value::Long(1)).unwrap().unwrap()[1], Value::Int(20));
    }

    #[test]
    fn test_pattern_index_on_numeric_column_rejected() {
        let schema = SchemaBuilder::new("Person")
            .add_id("id", TypeCode::Long)
            .add("age", TypeCode::Int)
            .build()
            .unwrap();
        let table = Arc::new(ColumnarTable::new(schema.clone(), Config::small().table));
        let indexes =
            TableIndexes::new(&[IndexPlan::new("idx_age", IndexKind::Prefix, vec![1])]).unwrap();
        let err = RepositoryRuntime::new(
            table,
            schema,
            indexes,
            Arc::new(TypeHandlerRegistry::with_defaults()),
            Config::small(),
        )
        .err()
        .unwrap();
        assert!(err.is_not_supported());
    }

    #[test]
    fn test_find_order_limit() {
        let runtime = setup_people();
        let query = CompiledQuery::builder(OpCode::Find)
            .condition(age(Operator::Gte, 0))
            .order_by(OrderBy::desc(1))
            .limit(1)
            .build()
            .unwrap();
        let rows = run(&runtime, query, &[Value::Int(30)]).into_rows();
        assert_eq!(ids(&rows), vec![3]);
    }

    #[test]
    fn test_count_exists_and_ids() {
        let runtime = setup_people();
        let count = CompiledQuery::builder(OpCode::Count)
            .condition(age(Operator::Eq, 0))
            .build()
            .unwrap();
        assert_eq!(run(&runtime, count, &[Value::Int(30)]), QueryResult::Count(2));

        let exists = CompiledQuery::builder(OpCode::Exists)
            .condition(age(Operator::Gt, 0))
            .build()
            .unwrap();
        assert_eq!(run(&runtime, exists, &[Value::Int(99)]), QueryResult::Exists(false));

        let by_id = CompiledQuery::builder(OpCode::ExistsById).build().unwrap();
        assert_eq!(run(&runtime, by_id, &[Value::Long(2)]), QueryResult::Exists(true));

        let find = CompiledQuery::builder(OpCode::FindById).build().unwrap();
        assert_eq!(run(&runtime, find, &[Value::Long(42)]), QueryResult::Single(None));
    }

    #[test]
    fn test_distinct_projection() {
        let runtime = setup_people();
        let query = CompiledQuery::builder(OpCode::FindAll)
            .project(ProjectionItem::column("city", 2))
            .distinct()
            .build()
            .unwrap();
        let rows = run(&runtime, query, &[]).into_rows();
        assert_eq!(
            rows,
            vec![vec![Value::text("Oslo")], vec![Value::text("Rome")], vec![Value::Null]]
        );
    }

    #[test]
    fn test_projection_navigation() {
        let companies = setup_companies();
        let runtime = setup_people().with_related("company", companies);
        let query = CompiledQuery::builder(OpCode::FindAll)
            .project(ProjectionItem::column("id", 0))
            .project(ProjectionItem::column("employer", 1).through(3, "company"))
            .build()
            .unwrap();
        let rows = run(&runtime, query, &[]).into_rows();
        let employers: Vec<_> = rows.iter().map(|r| r[1].clone()).collect();
        assert_eq!(
            employers,
            vec![Value::text("Acme"), Value::text("Initech"), Value::Null, Value::text("Acme")]
        );
    }

    #[test]
    fn test_grouping_with_having() {
        let runtime = setup_people();
        let query = CompiledQuery::builder(OpCode::FindAll)
            .group_by(Grouping::new(vec![1], GroupValueKind::Count).having(Operator::Gte, 0))
            .build()
            .unwrap();
        let result = run(&runtime, query, &[Value::Int(2)]);
        assert_eq!(
            result,
            QueryResult::Grouped(vec![(vec![Value::Int(30)], GroupValue::Count(2))])
        );

        let query = CompiledQuery::builder(OpCode::FindAll)
            .group_by(Grouping::new(vec![2], GroupValueKind::List))
            .build()
            .unwrap();
        let QueryResult::Grouped(groups) = run(&runtime, query, &[]) else {
            panic!("expected groups");
        };
        let keys: Vec<_> = groups.iter().map(|(k, _)| k[0].clone()).collect();
        assert_eq!(keys, vec![Value::text("Oslo"), Value::text("Rome"), Value::Null]);
        assert!(matches!(&groups[0].1, GroupValue::List(rows) if rows.len() == 2));
    }

    #[test]
    fn test_join_filters_source() {
        let companies = setup_companies();
        let runtime = setup_people().with_related("company", companies);
        let join = JoinClause::new("company", JoinPlan::to_id(3, TypeCode::Long, 0), Cardinality::ManyToOne)
            .with_condition(CompiledCondition::new(1, TypeCode::String, Operator::Eq, 0))
            .with_fetch(CollectionKind::List);
        let query = CompiledQuery::builder(OpCode::FindAll).join(join).build().unwrap();
        let rows = run(&runtime, query, &[Value::text("Acme")]).into_rows();
        assert_eq!(ids(&rows), vec![1, 4]);
        assert_eq!(rows[0][4], Value::list([Value::Long(1), Value::text("Acme")]));

        let left = JoinClause::new(
            "company",
            JoinPlan::to_id(3, TypeCode::Long, 0).with_join_type(JoinType::Left),
            Cardinality::ManyToOne,
        );
        let query = CompiledQuery::builder(OpCode::FindAll).join(left).build().unwrap();
        assert_eq!(run(&runtime, query, &[]).into_rows().len(), 4);
    }

    #[test]
    fn test_one_to_many_and_many_to_many_fetch() {
        let people = Arc::new(setup_people());
        let companies_schema = SchemaBuilder::new("Company")
            .add_id("id", TypeCode::Long)
            .add("name", TypeCode::String)
            .build()
            .unwrap();
        let links_schema = SchemaBuilder::new("CompanyPartner")
            .add_id("id", TypeCode::Long)
            .add("company_id", TypeCode::Long)
            .add("person_id", TypeCode::Long)
            .build()
            .unwrap();
        let links = setup_runtime(links_schema, &[]);
        links.save(vec![Value::Null, Value::Long(2), Value::Long(3)]).unwrap();
        let companies = setup_runtime(companies_schema, &[])
            .with_related("people", Arc::clone(&people))
            .with_related("partners", Arc::new(links));
        companies.save(vec![Value::Long(1), Value::text("Acme")]).unwrap();
        companies.save(vec![Value::Long(2), Value::text("Initech")]).unwrap();

        let staff = JoinClause::new("people", JoinPlan::to_column(3, TypeCode::Long, 0), Cardinality::OneToMany)
            .with_fetch(CollectionKind::List);
        let query = CompiledQuery::builder(OpCode::FindAll).join(staff).build().unwrap();
        let rows = run(&companies, query, &[]).into_rows();
        let Value::List(acme_staff) = &rows[0][2] else {
            panic!("expected a fetched collection");
        };
        assert_eq!(acme_staff.len(), 2);

        let partners = JoinClause::new(
            "people",
            JoinPlan::to_id(0, TypeCode::Long, 0).with_join_table(JoinTable::new("partners", 1, 2)),
            Cardinality::ManyToMany,
        )
        .with_fetch(CollectionKind::Set);
        let query = CompiledQuery::builder(OpCode::FindAll).join(partners).build().unwrap();
        let rows = run(&companies, query, &[]).into_rows();
        assert_eq!(ids(&rows), vec![2]);
        let Value::List(partners) = &rows[0][2] else {
            panic!("expected a fetched collection");
        };
        assert_eq!(partners.len(), 1);
    }

    #[test]
    fn test_update_and_delete_queries() {
        let runtime = setup_people();
        let update = CompiledQuery::builder(OpCode::UpdateQuery)
            .condition(age(Operator::Eq, 0))
            .set(2, 1)
            .build()
            .unwrap();
        let prepared = runtime.prepare(update).unwrap();
        let result = runtime
            .execute(&prepared, &[Value::Int(30), Value::text("Paris")])
            .unwrap();
        assert_eq!(result, QueryResult::Modified(2));
        assert_eq!(runtime.find_by_id(&Value::Long(2)).unwrap().unwrap()[2], Value::text("Paris"));

        // Null into a non-nullable column fails before any row changes
        let bad = CompiledQuery::builder(OpCode::UpdateQuery)
            .condition(age(Operator::Eq, 0))
            .set(1, 1)
            .build()
            .unwrap();
        let prepared = runtime.prepare(bad).unwrap();
        let err = runtime.execute(&prepared, &[Value::Int(30), Value::Null]).unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(runtime.table().live_count(), 4);

        let delete = CompiledQuery::builder(OpCode::DeleteAllById).build().unwrap();
        let result = run(&runtime, delete, &[Value::list([Value::Long(1), Value::Long(99)])]);
        assert_eq!(result, QueryResult::Modified(1));

        let delete = CompiledQuery::builder(OpCode::DeleteQuery)
            .condition(age(Operator::Gte, 0))
            .build()
            .unwrap();
        assert_eq!(run(&runtime, delete, &[Value::Int(40)]), QueryResult::Modified(1));
        assert_eq!(runtime.table().live_count(), 2);
    }

    #[test]
    fn test_missing_related_repository() {
        let runtime = setup_people();
        let query = CompiledQuery::builder(OpCode::FindAll)
            .project(ProjectionItem::column("x", 1).through(3, "nowhere"))
            .build()
            .unwrap();
        assert!(runtime.prepare(query).err().unwrap().is_configuration_error());
    }
}
