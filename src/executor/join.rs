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

//! Join resolution
//!
//! Three relationship shapes are supported:
//!
//! - many-to-one: each source row carries a foreign key resolved to at most
//!   one target row, either through the target's id lookup or an equality scan
//! - one-to-many: the target table carries the foreign key; a source row's id
//!   is matched against it and the matches are hydrated into a collection
//! - many-to-many: an explicit join table links source ids to target ids; its
//!   membership is built once per execution and then probed per source row
//!
//! Joins only read. Every multi-column read goes through the table's seqlock.

use std::fmt;

use log::debug;
use rustc_hash::FxHashMap;

use crate::core::{Error, JoinType, Result, RowRef, StorageKind, StorageValue, TypeCode};
use crate::executor::materialize::{materialize_live, EntityMaterializer};
use crate::storage::{GeneratedTable, Selection};

/// Join table of a many-to-many relationship
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTable {
    /// Name of the join table, as registered with the runtime
    pub table: String,

    /// Column holding the source id
    pub join_column: usize,

    /// Column holding the target id
    pub inverse_join_column: usize,
}

impl JoinTable {
    pub fn new(table: impl Into<String>, join_column: usize, inverse_join_column: usize) -> Self {
        Self {
            table: table.into(),
            join_column,
            inverse_join_column,
        }
    }
}

/// How a source table reaches a target table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPlan {
    /// Foreign key column on the source (many-to-one) or target (one-to-many)
    pub source_column: usize,

    /// Logical type of the foreign key column
    pub source_type: TypeCode,

    /// Column matched against the foreign key value
    pub target_column: usize,

    /// True when `target_column` is the target's unique id
    pub target_is_id: bool,

    pub join_type: JoinType,

    /// Present for many-to-many relationships
    pub join_table: Option<JoinTable>,
}

impl JoinPlan {
    /// Inner many-to-one join onto the target's id
    pub fn to_id(source_column: usize, source_type: TypeCode, target_id_column: usize) -> Self {
        Self {
            source_column,
            source_type,
            target_column: target_id_column,
            target_is_id: true,
            join_type: JoinType::Inner,
            join_table: None,
        }
    }

    /// Inner join onto an arbitrary target column
    pub fn to_column(source_column: usize, source_type: TypeCode, target_column: usize) -> Self {
        Self {
            target_is_id: false,
            ..Self::to_id(source_column, source_type, target_column)
        }
    }

    /// Builder method to set the join type
    pub fn with_join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = join_type;
        self
    }

    /// Builder method to route the join through a join table
    pub fn with_join_table(mut self, join_table: JoinTable) -> Self {
        self.join_table = Some(join_table);
        self
    }

    /// Reject join types the resolver cannot execute
    pub fn validate(&self) -> Result<()> {
        match self.join_type {
            JoinType::Inner | JoinType::Left => Ok(()),
            other => Err(Error::not_supported(format!("{} joins are not supported", other))),
        }
    }

    pub fn is_left(&self) -> bool {
        self.join_type == JoinType::Left
    }
}

/// A source row paired with its resolved target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinedRow {
    pub source: RowRef,

    /// `None` for unmatched rows of a left join
    pub target: Option<RowRef>,
}

/// Result container of a collection hydration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionKind {
    #[default]
    List,
    /// Equal elements are kept once, first occurrence wins
    Set,
}

impl fmt::Display for JoinedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            Some(target) => write!(f, "{:?} -> {:?}", self.source, target),
            None => write!(f, "{:?} -> null", self.source),
        }
    }
}

/// Convert a key to the physical form of a column of `kind`
///
/// Returns `None` when the value cannot be represented, which can never match.
pub(crate) fn coerce(value: &StorageValue, kind: StorageKind) -> Option<StorageValue> {
    match (value, kind) {
        (StorageValue::Null, _) => None,
        (StorageValue::Str(s), StorageKind::String) => Some(StorageValue::Str(s.clone())),
        (StorageValue::Str(_), _) | (_, StorageKind::String) => None,
        (v, StorageKind::Int) => v
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(StorageValue::Int),
        (v, StorageKind::Long) => v.as_i64().map(StorageValue::Long),
    }
}

/// Live rows of `table` whose `column` equals `value`
pub(crate) fn scan_equal(table: &dyn GeneratedTable, column: usize, value: &StorageValue) -> Selection {
    let rows = match coerce(value, table.type_code_at(column).storage_kind()) {
        Some(StorageValue::Int(v)) => table.scan_equals_int(column, v),
        Some(StorageValue::Long(v)) => table.scan_equals_long(column, v),
        Some(StorageValue::Str(s)) => table.scan_equals_string(column, &s),
        Some(StorageValue::Null) | None => return Selection::empty(),
    };
    Selection::from_scan_indices(table, &rows)
}

/// Read one cell of a live row in a consistent snapshot; `None` once dead
pub(crate) fn read_live(table: &dyn GeneratedTable, row: RowRef, column: usize) -> Option<StorageValue> {
    let mut value = None;
    table.read_with_seqlock(row.index(), &mut || {
        value = table
            .is_live(row)
            .then(|| table.read_storage(column, row.index()));
    });
    value
}

/// Many-to-one resolution of a foreign key column
pub struct ManyToOne<'a> {
    source: &'a dyn GeneratedTable,
    target: &'a dyn GeneratedTable,
    plan: &'a JoinPlan,
    memo: FxHashMap<StorageValue, Option<RowRef>>,
}

impl<'a> ManyToOne<'a> {
    pub fn new(
        source: &'a dyn GeneratedTable,
        target: &'a dyn GeneratedTable,
        plan: &'a JoinPlan,
    ) -> Result<Self> {
        plan.validate()?;
        Ok(Self {
            source,
            target,
            plan,
            memo: FxHashMap::default(),
        })
    }

    /// Target row referenced by `source_row`, if any
    pub fn target_of(&mut self, source_row: RowRef) -> Option<RowRef> {
        let fk = read_live(self.source, source_row, self.plan.source_column)?;
        if fk.is_null() {
            return None;
        }
        if self.plan.target_is_id {
            let id_kind = self.target.type_code_at(self.target.id_column()).storage_kind();
            return coerce(&fk, id_kind).and_then(|id| self.target.lookup_id(&id));
        }
        let (target, column) = (self.target, self.plan.target_column);
        *self
            .memo
            .entry(fk)
            .or_insert_with_key(|fk| scan_equal(target, column, fk).iter().next())
    }

    /// Pair every source row with its target
    ///
    /// With `target_filter`, targets outside the filter count as unmatched.
    /// Inner joins drop unmatched rows; left joins keep them with no target.
    pub fn resolve(&mut self, rows: &Selection, target_filter: Option<&Selection>) -> Vec<JoinedRow> {
        let mut joined = Vec::with_capacity(rows.len());
        for source in rows.iter() {
            let target = self
                .target_of(source)
                .filter(|t| target_filter.map_or(true, |f| f.contains(*t)));
            if target.is_some() || self.plan.is_left() {
                joined.push(JoinedRow { source, target });
            }
        }
        debug!(
            "many-to-one join kept {} of {} source rows",
            joined.len(),
            rows.len()
        );
        joined
    }

    /// Source rows whose target is in `target_filter`
    ///
    /// Left joins keep every source row.
    pub fn filter_source(&mut self, rows: &Selection, target_filter: &Selection) -> Selection {
        if self.plan.is_left() {
            return rows.clone();
        }
        rows.filter(|source| {
            self.target_of(source)
                .is_some_and(|t| target_filter.contains(t))
        })
    }
}

/// Target rows whose foreign key column references `source_row`'s id
pub fn hydrate_rows(
    source: &dyn GeneratedTable,
    source_row: RowRef,
    target: &dyn GeneratedTable,
    fk_column: usize,
) -> Selection {
    match read_live(source, source_row, source.id_column()) {
        Some(id) if !id.is_null() => scan_equal(target, fk_column, &id),
        _ => Selection::empty(),
    }
}

/// Materialize a one-to-many collection of `source_row`
pub fn hydrate<E: PartialEq>(
    source: &dyn GeneratedTable,
    source_row: RowRef,
    target: &dyn GeneratedTable,
    fk_column: usize,
    materializer: &dyn EntityMaterializer<E>,
    kind: CollectionKind,
) -> Result<Vec<E>> {
    let rows = hydrate_rows(source, source_row, target, fk_column);
    collect(target, rows.iter(), materializer, kind)
}

pub(crate) fn collect<E: PartialEq>(
    target: &dyn GeneratedTable,
    rows: impl Iterator<Item = RowRef>,
    materializer: &dyn EntityMaterializer<E>,
    kind: CollectionKind,
) -> Result<Vec<E>> {
    let mut out: Vec<E> = Vec::new();
    for row in rows {
        if let Some(entity) = materialize_live(target, row, materializer)? {
            if kind == CollectionKind::Set && out.contains(&entity) {
                continue;
            }
            out.push(entity);
        }
    }
    Ok(out)
}

fn join_key(value: StorageValue) -> StorageValue {
    match value {
        StorageValue::Int(v) => StorageValue::Long(v as i64),
        other => other,
    }
}

/// Source id to target rows, built from a join table
#[derive(Debug, Default)]
pub struct Membership {
    targets: FxHashMap<StorageValue, Vec<RowRef>>,
}

impl Membership {
    /// Scan the join table once
    ///
    /// Links whose target id does not resolve to a live target row, or whose
    /// target is outside `target_filter`, are skipped.
    pub fn build(
        join: &dyn GeneratedTable,
        join_table: &JoinTable,
        target: &dyn GeneratedTable,
        target_filter: Option<&Selection>,
    ) -> Self {
        let id_kind = target.type_code_at(target.id_column()).storage_kind();
        let mut targets: FxHashMap<StorageValue, Vec<RowRef>> = FxHashMap::default();
        for row in join.scan_all() {
            let mut pair = None;
            join.read_with_seqlock(row, &mut || {
                pair = join.live_ref(row).map(|_| {
                    (
                        join.read_storage(join_table.join_column, row),
                        join.read_storage(join_table.inverse_join_column, row),
                    )
                });
            });
            let Some((source_id, target_id)) = pair else {
                continue;
            };
            if source_id.is_null() {
                continue;
            }
            let Some(target_row) = coerce(&target_id, id_kind).and_then(|id| target.lookup_id(&id))
            else {
                continue;
            };
            if target_filter.is_some_and(|f| !f.contains(target_row)) {
                continue;
            }
            targets.entry(join_key(source_id)).or_default().push(target_row);
        }
        for rows in targets.values_mut() {
            rows.sort_unstable();
            rows.dedup();
        }
        debug!(
            "join table {} links {} source ids",
            join_table.table,
            targets.len()
        );
        Self { targets }
    }

    /// Number of source ids with at least one target
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Targets linked to `source_id`, in row order
    pub fn targets_for(&self, source_id: &StorageValue) -> &[RowRef] {
        self.targets
            .get(&join_key(source_id.clone()))
            .map_or(&[], Vec::as_slice)
    }

    /// Source rows with at least one linked target
    pub fn filter_source(&self, source: &dyn GeneratedTable, rows: &Selection) -> Selection {
        rows.filter(|row| {
            read_live(source, row, source.id_column())
                .is_some_and(|id| !self.targets_for(&id).is_empty())
        })
    }

    /// Target rows linked to `source_row`
    pub fn hydrate_rows(&self, source: &dyn GeneratedTable, source_row: RowRef) -> Vec<RowRef> {
        read_live(source, source_row, source.id_column())
            .map(|id| self.targets_for(&id).to_vec())
            .unwrap_or_default()
    }

    /// Materialize the many-to-many collection of `source_row`
    pub fn hydrate<E: PartialEq>(
        &self,
        source: &dyn GeneratedTable,
        source_row: RowRef,
        target: &dyn GeneratedTable,
        materializer: &dyn EntityMaterializer<E>,
        kind: CollectionKind,
    ) -> Result<Vec<E>> {
        let rows = self.hydrate_rows(source, source_row);
        collect(target, rows.into_iter(), materializer, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SchemaBuilder, Value};
    use crate::executor::materialize::MaterializerCache;
    use crate::storage::{ColumnarTable, TableConfig};

    fn setup_customers() -> ColumnarTable {
        let schema = SchemaBuilder::new("Customer")
            .add_id("id", TypeCode::Long)
            .add("name", TypeCode::String)
            .build()
            .unwrap();
        let table = ColumnarTable::new(schema, TableConfig::new());
        for (id, name) in [(1, "ann"), (2, "bob"), (3, "cyd")] {
            table.insert_from(&[Value::Long(id), Value::text(name)]).unwrap();
        }
        table
    }

    fn setup_orders() -> ColumnarTable {
        let schema = SchemaBuilder::new("Order")
            .add_id("id", TypeCode::Long)
            .add_nullable("customer_id", TypeCode::Int)
            .add("code", TypeCode::String)
            .build()
            .unwrap();
        let table = ColumnarTable::new(schema, TableConfig::new());
        let rows = [
            (10, Value::Int(1), "a"),
            (11, Value::Int(2), "b"),
            (12, Value::Int(1), "c"),
            (13, Value::Null, "d"),
            (14, Value::Int(99), "e"),
        ];
        for (id, customer, code) in rows {
            table
                .insert_from(&[Value::Long(id), customer, Value::text(code)])
                .unwrap();
        }
        table
    }

    #[test]
    fn test_inner_join_is_subset() {
        let (customers, orders) = (setup_customers(), setup_orders());
        let plan = JoinPlan::to_id(1, TypeCode::Int, 0);
        let mut join = ManyToOne::new(&orders, &customers, &plan).unwrap();
        let source = Selection::all(&orders);
        let joined = join.resolve(&source, None);
        assert_eq!(joined.len(), 3);
        assert!(joined.iter().all(|j| source.contains(j.source) && j.target.is_some()));
    }

    #[test]
    fn test_left_join_keeps_cardinality() {
        let (customers, orders) = (setup_customers(), setup_orders());
        let plan = JoinPlan::to_id(1, TypeCode::Int, 0).with_join_type(JoinType::Left);
        let mut join = ManyToOne::new(&orders, &customers, &plan).unwrap();
        let source = Selection::all(&orders);
        let joined = join.resolve(&source, None);
        assert_eq!(joined.len(), source.len());
        assert_eq!(joined.iter().filter(|j| j.target.is_none()).count(), 2);
    }

    #[test]
    fn test_join_target_filter() {
        let (customers, orders) = (setup_customers(), setup_orders());
        let plan = JoinPlan::to_id(1, TypeCode::Int, 0);
        let mut join = ManyToOne::new(&orders, &customers, &plan).unwrap();
        let ann = Selection::from_scan_indices(&customers, &customers.scan_equals_string(1, "ann"));
        let kept = join.filter_source(&Selection::all(&orders), &ann);
        let codes: Vec<_> = kept
            .iter()
            .map(|r| orders.read_string(2, r.index()).unwrap().to_string())
            .collect();
        assert_eq!(codes, vec!["a", "c"]);
    }

    #[test]
    fn test_join_on_non_id_column() {
        let (customers, orders) = (setup_customers(), setup_orders());
        // order codes never equal a customer name
        let plan = JoinPlan::to_column(2, TypeCode::String, 1).with_join_type(JoinType::Left);
        let mut join = ManyToOne::new(&orders, &customers, &plan).unwrap();
        let joined = join.resolve(&Selection::all(&orders), None);
        assert!(joined.iter().all(|j| j.target.is_none()));
    }

    #[test]
    fn test_unsupported_join_types() {
        let (customers, orders) = (setup_customers(), setup_orders());
        for join_type in [JoinType::Right, JoinType::Full] {
            let plan = JoinPlan::to_id(1, TypeCode::Int, 0).with_join_type(join_type);
            let err = ManyToOne::new(&orders, &customers, &plan).err().unwrap();
            assert!(err.is_not_supported());
        }
    }

    #[test]
    fn test_one_to_many_hydration() {
        let (customers, orders) = (setup_customers(), setup_orders());
        let materializer = MaterializerCache::new().row_materializer(orders.schema());
        let ann = customers.lookup_by_id(1).unwrap();
        let rows = hydrate(&customers, ann, &orders, 1, &materializer, CollectionKind::List).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r[0].clone()).collect();
        assert_eq!(ids, vec![Value::Long(10), Value::Long(12)]);

        let cyd = customers.lookup_by_id(3).unwrap();
        assert!(hydrate_rows(&customers, cyd, &orders, 1).is_empty());
    }

    fn setup_links(pairs: &[(i64, i64)]) -> ColumnarTable {
        let schema = SchemaBuilder::new("CustomerTag")
            .add_id("id", TypeCode::Long)
            .add("customer_id", TypeCode::Long)
            .add("tag_id", TypeCode::Long)
            .build()
            .unwrap();
        let table = ColumnarTable::new(schema, TableConfig::new());
        for (i, (customer, tag)) in pairs.iter().enumerate() {
            table
                .insert_from(&[Value::Long(i as i64), Value::Long(*customer), Value::Long(*tag)])
                .unwrap();
        }
        table
    }

    fn setup_tags() -> ColumnarTable {
        let schema = SchemaBuilder::new("Tag")
            .add_id("id", TypeCode::Long)
            .add("label", TypeCode::String)
            .build()
            .unwrap();
        let table = ColumnarTable::new(schema, TableConfig::new());
        for (id, label) in [(100, "red"), (101, "green"), (102, "blue")] {
            table.insert_from(&[Value::Long(id), Value::text(label)]).unwrap();
        }
        table
    }

    #[test]
    fn test_many_to_many_permutation_invariance() {
        let (customers, tags) = (setup_customers(), setup_tags());
        let link = JoinTable::new("customer_tags", 1, 2);
        let pairs = [(1, 100), (1, 102), (2, 101), (1, 100), (3, 999)];
        let mut reversed = pairs;
        reversed.reverse();

        let forward = Membership::build(&setup_links(&pairs), &link, &tags, None);
        let backward = Membership::build(&setup_links(&reversed), &link, &tags, None);
        let ann = customers.lookup_by_id(1).unwrap();
        assert_eq!(forward.hydrate_rows(&customers, ann), backward.hydrate_rows(&customers, ann));
        assert_eq!(forward.hydrate_rows(&customers, ann).len(), 2);
        // tag 999 does not exist, so customer 3 has no membership
        assert_eq!(forward.len(), 2);

        let kept = forward.filter_source(&customers, &Selection::all(&customers));
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_many_to_many_target_filter() {
        let (customers, tags) = (setup_customers(), setup_tags());
        let links = setup_links(&[(1, 100), (1, 102), (2, 101)]);
        let blue = Selection::from_scan_indices(&tags, &tags.scan_equals_string(1, "blue"));
        let membership = Membership::build(&links, &JoinTable::new("ct", 1, 2), &tags, Some(&blue));
        let materializer = MaterializerCache::new().row_materializer(tags.schema());
        let ann = customers.lookup_by_id(1).unwrap();
        let rows = membership
            .hydrate(&customers, ann, &tags, &materializer, CollectionKind::Set)
            .unwrap();
        assert_eq!(rows, vec![vec![Value::Long(102), Value::text("blue")]]);
        assert!(membership.targets_for(&StorageValue::Int(2)).is_empty());
    }
}
