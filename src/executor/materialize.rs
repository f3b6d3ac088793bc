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

//! Row materialization
//!
//! The engine hands surviving rows to an [`EntityMaterializer`] and accepts
//! entities for writing through an [`EntitySaver`]. [`RowMaterializer`] is the
//! built-in implementation producing [`Row`]s.
//!
//! Column readers are compiled once per distinct entity shape (column type
//! codes plus nullability) and memoized in a [`MaterializerCache`]; two
//! entities with the same layout share one set of readers.

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::common::maps::{new_concurrent_map, ConcurrentMap};
use crate::core::{Error, Result, Row, RowRef, Schema, StorageKind, StorageValue, TypeCode, Value};
use crate::storage::GeneratedTable;

/// Builds an entity from one row
///
/// Called inside a seqlock read, so it may run more than once per row and
/// must only read.
pub trait EntityMaterializer<E>: Send + Sync {
    fn materialize(&self, table: &dyn GeneratedTable, row_index: u32) -> Result<E>;
}

/// Turns entities into column values for insertion
pub trait EntitySaver<E>: Send + Sync {
    /// One value per column, in column order
    fn to_values(&self, entity: &E) -> Result<Row>;

    /// The entity carrying the id it was saved under
    fn with_id(&self, entity: E, id: Value) -> Result<E>;
}

/// Structural fingerprint of an entity layout
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeKey(Vec<(TypeCode, bool)>);

impl ShapeKey {
    pub fn of(schema: &Schema) -> Self {
        ShapeKey(
            schema
                .columns
                .iter()
                .map(|c| (c.type_code, c.nullable))
                .collect(),
        )
    }
}

type ColumnReader = Box<dyn Fn(&dyn GeneratedTable, u32) -> Result<Value> + Send + Sync>;

/// Compiled column readers of one shape
pub struct CompiledShape {
    readers: Vec<ColumnReader>,
}

impl CompiledShape {
    fn compile(key: &ShapeKey) -> Self {
        let readers = key
            .0
            .iter()
            .enumerate()
            .map(|(column, &(code, nullable))| column_reader(column, code, nullable))
            .collect();
        Self { readers }
    }

    pub fn column_count(&self) -> usize {
        self.readers.len()
    }
}

fn column_reader(column: usize, code: TypeCode, nullable: bool) -> ColumnReader {
    match (code.storage_kind(), nullable) {
        (StorageKind::Int, false) => Box::new(move |t: &dyn GeneratedTable, row: u32| {
            Value::from_storage(code, &StorageValue::Int(t.read_int(column, row)))
        }),
        (StorageKind::Long, false) => Box::new(move |t: &dyn GeneratedTable, row: u32| {
            Value::from_storage(code, &StorageValue::Long(t.read_long(column, row)))
        }),
        (StorageKind::String, _) => Box::new(move |t: &dyn GeneratedTable, row: u32| {
            Ok(match t.read_string(column, row) {
                Some(s) => Value::from_storage(code, &StorageValue::Str(s))?,
                None => Value::Null,
            })
        }),
        (_, true) => Box::new(move |t: &dyn GeneratedTable, row: u32| {
            Value::from_storage(code, &t.read_storage(column, row))
        }),
    }
}

/// Materializer producing one [`Value`] per column
#[derive(Clone)]
pub struct RowMaterializer {
    entity: Arc<str>,
    fields: Arc<[String]>,
    id_column: usize,
    shape: Arc<CompiledShape>,
}

impl RowMaterializer {
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Read a single column of a row
    pub fn read_column(&self, table: &dyn GeneratedTable, column: usize, row_index: u32) -> Result<Value> {
        let reader = self
            .shape
            .readers
            .get(column)
            .ok_or_else(|| Error::column_out_of_bounds(column, self.shape.column_count()))?;
        reader(table, row_index).map_err(|e| self.wrap(column, e))
    }

    fn wrap(&self, column: usize, error: Error) -> Error {
        let field = self.fields.get(column).map_or("?", String::as_str);
        Error::materialization(self.entity.as_ref(), field, error.to_string())
    }
}

impl fmt::Debug for RowMaterializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowMaterializer")
            .field("entity", &self.entity)
            .field("fields", &self.fields)
            .finish()
    }
}

impl EntityMaterializer<Row> for RowMaterializer {
    fn materialize(&self, table: &dyn GeneratedTable, row_index: u32) -> Result<Row> {
        self.shape
            .readers
            .iter()
            .enumerate()
            .map(|(column, reader)| reader(table, row_index).map_err(|e| self.wrap(column, e)))
            .collect()
    }
}

impl EntitySaver<Row> for RowMaterializer {
    fn to_values(&self, entity: &Row) -> Result<Row> {
        if entity.len() != self.shape.column_count() {
            return Err(Error::invalid_argument(format!(
                "{} rows have {} columns, got {}",
                self.entity,
                self.shape.column_count(),
                entity.len()
            )));
        }
        Ok(entity.clone())
    }

    fn with_id(&self, mut entity: Row, id: Value) -> Result<Row> {
        let slot = entity
            .get_mut(self.id_column)
            .ok_or_else(|| Error::column_out_of_bounds(self.id_column, self.shape.column_count()))?;
        *slot = id;
        Ok(entity)
    }
}

/// Shape-keyed cache of compiled column readers
#[derive(Default)]
pub struct MaterializerCache {
    shapes: ConcurrentMap<ShapeKey, Arc<CompiledShape>>,
}

impl MaterializerCache {
    pub fn new() -> Self {
        Self {
            shapes: new_concurrent_map(),
        }
    }

    /// Number of distinct shapes compiled so far
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Materializer for `schema`, reusing the readers of an identical shape
    pub fn row_materializer(&self, schema: &Schema) -> RowMaterializer {
        let key = ShapeKey::of(schema);
        let shape = self
            .shapes
            .entry(key.clone())
            .or_insert_with(|| {
                debug!("compiling materializer shape for {}", schema.entity_name);
                Arc::new(CompiledShape::compile(&key))
            })
            .value()
            .clone();
        RowMaterializer {
            entity: Arc::from(schema.entity_name.as_str()),
            fields: schema.columns.iter().map(|c| c.name.clone()).collect(),
            id_column: schema.id_column(),
            shape,
        }
    }
}

/// Materialize `row` if it is still live, in one consistent read
pub fn materialize_live<E>(
    table: &dyn GeneratedTable,
    row: RowRef,
    materializer: &dyn EntityMaterializer<E>,
) -> Result<Option<E>> {
    let mut result = None;
    table.read_with_seqlock(row.index(), &mut || {
        result = if table.is_live(row) {
            Some(materializer.materialize(table, row.index()))
        } else {
            None
        };
    });
    result.transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SchemaBuilder;
    use crate::storage::{ColumnarTable, TableConfig};
    use chrono::NaiveDate;

    fn setup_schema(entity: &str) -> Schema {
        SchemaBuilder::new(entity)
            .add_id("id", TypeCode::Long)
            .add_nullable("born", TypeCode::LocalDate)
            .add("score", TypeCode::Float)
            .add_nullable("note", TypeCode::String)
            .build()
            .unwrap()
    }

    #[test]
    fn test_materialize_row() {
        let schema = setup_schema("Person");
        let cache = MaterializerCache::new();
        let materializer = cache.row_materializer(&schema);
        let table = ColumnarTable::new(schema, TableConfig::new());
        let born = NaiveDate::from_ymd_opt(1990, 5, 17).unwrap();
        let row = table
            .insert_from(&[Value::Long(1), Value::LocalDate(born), Value::Float(1.5), Value::Null])
            .unwrap();

        let values = materialize_live(&table, row, &materializer).unwrap().unwrap();
        assert_eq!(
            values,
            vec![Value::Long(1), Value::LocalDate(born), Value::Float(1.5), Value::Null]
        );
        assert_eq!(materializer.read_column(&table, 2, row.index()).unwrap(), Value::Float(1.5));
        assert!(materializer.read_column(&table, 9, row.index()).is_err());
    }

    #[test]
    fn test_dead_row_is_absent() {
        let schema = setup_schema("Person");
        let materializer = MaterializerCache::new().row_materializer(&schema);
        let table = ColumnarTable::new(schema, TableConfig::new());
        let row = table
            .insert_from(&[Value::Long(1), Value::Null, Value::Float(0.0), Value::Null])
            .unwrap();
        table.tombstone(row);
        assert!(materialize_live(&table, row, &materializer).unwrap().is_none());
    }

    #[test]
    fn test_shapes_are_shared() {
        let cache = MaterializerCache::new();
        let a = cache.row_materializer(&setup_schema("A"));
        let b = cache.row_materializer(&setup_schema("B"));
        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&a.shape, &b.shape));
        assert_eq!(b.entity(), "B");

        let other = SchemaBuilder::new("C")
            .add_id("id", TypeCode::String)
            .build()
            .unwrap();
        cache.row_materializer(&other);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_saver_round_trip() {
        let schema = setup_schema("Person");
        let materializer = MaterializerCache::new().row_materializer(&schema);
        let row = vec![Value::Null, Value::Null, Value::Float(2.0), Value::text("x")];
        let values = materializer.to_values(&row).unwrap();
        let saved = materializer.with_id(values, Value::Long(7)).unwrap();
        assert_eq!(saved[0], Value::Long(7));
        assert!(materializer.to_values(&vec![Value::Null]).unwrap_err().is_invalid_argument());
    }
}
