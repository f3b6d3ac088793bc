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

//! Entity layout: column definitions and the id column

use std::fmt;

use rustc_hash::FxHashMap;

use super::error::{Error, Result};
use super::types::TypeCode;
use super::value::{StorageValue, Value};

/// A column definition in an entity layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaColumn {
    /// Column position (0-based)
    pub id: usize,

    /// Field name
    pub name: String,

    /// Logical type of the column
    pub type_code: TypeCode,

    /// False for primitive fields, which can never be absent
    pub nullable: bool,

    /// Whether this column is the entity id
    pub primary_key: bool,
}

impl SchemaColumn {
    /// Create a new column definition
    pub fn new(
        id: usize,
        name: impl Into<String>,
        type_code: TypeCode,
        nullable: bool,
        primary_key: bool,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            type_code,
            nullable,
            primary_key,
        }
    }
}

impl fmt::Display for SchemaColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.type_code)?;
        if self.primary_key {
            write!(f, " ID")?;
        } else if !self.nullable {
            write!(f, " NOT NULL")?;
        }
        Ok(())
    }
}

/// Column layout of one entity table
#[derive(Debug, Clone)]
pub struct Schema {
    /// Entity name, used in diagnostics
    pub entity_name: String,

    /// Columns in storage order
    pub columns: Vec<SchemaColumn>,

    id_column: usize,
    name_index: FxHashMap<String, usize>,
}

impl Schema {
    /// Create a new schema, validating that exactly one id column exists
    pub fn new(entity_name: impl Into<String>, columns: Vec<SchemaColumn>) -> Result<Self> {
        let entity_name = entity_name.into();
        let mut id_column = None;
        for col in &columns {
            if col.primary_key {
                if id_column.is_some() {
                    return Err(Error::invalid_argument(format!(
                        "entity {} declares more than one id column",
                        entity_name
                    )));
                }
                id_column = Some(col.id);
            }
        }
        let id_column = id_column.ok_or_else(|| {
            Error::MissingConfiguration(format!("entity {} has no id column", entity_name))
        })?;
        let name_index = columns
            .iter()
            .map(|c| (c.name.clone(), c.id))
            .collect::<FxHashMap<_, _>>();
        Ok(Self {
            entity_name,
            columns,
            id_column,
            name_index,
        })
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Position of the id column
    pub fn id_column(&self) -> usize {
        self.id_column
    }

    /// Column definition at a position
    pub fn column(&self, index: usize) -> Result<&SchemaColumn> {
        self.columns
            .get(index)
            .ok_or_else(|| Error::column_out_of_bounds(index, self.columns.len()))
    }

    /// Position of a named column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_index.get(name).copied()
    }

    /// Type codes in column order
    pub fn type_codes(&self) -> Vec<TypeCode> {
        self.columns.iter().map(|c| c.type_code).collect()
    }

    /// Convert a full row to its stored form
    ///
    /// Fails on arity mismatch, failed conversion or null in a non-nullable
    /// column. Nothing is written, so callers can check a row before they
    /// touch the table.
    pub fn to_storage_row(&self, values: &[Value]) -> Result<Vec<StorageValue>> {
        if values.len() != self.column_count() {
            return Err(Error::invalid_argument(format!(
                "{} expects {} values, got {}",
                self.entity_name,
                self.column_count(),
                values.len()
            )));
        }
        let mut stored = Vec::with_capacity(values.len());
        for (col, value) in self.columns.iter().zip(values) {
            let sv = value.to_storage(col.type_code)?;
            if sv.is_null() && !col.nullable {
                return Err(Error::invalid_argument(format!(
                    "null value for non-nullable column {}.{}",
                    self.entity_name, col.name
                )));
            }
            stored.push(sv);
        }
        Ok(stored)
    }
}

/// Builder for creating entity layouts
#[derive(Debug)]
pub struct SchemaBuilder {
    entity_name: String,
    columns: Vec<SchemaColumn>,
}

impl SchemaBuilder {
    /// Create a new schema builder
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            columns: Vec::new(),
        }
    }

    /// Add a column
    pub fn column(
        mut self,
        name: impl Into<String>,
        type_code: TypeCode,
        nullable: bool,
        primary_key: bool,
    ) -> Self {
        let id = self.columns.len();
        self.columns
            .push(SchemaColumn::new(id, name, type_code, nullable, primary_key));
        self
    }

    /// Add the id column
    pub fn add_id(self, name: impl Into<String>, type_code: TypeCode) -> Self {
        self.column(name, type_code, false, true)
    }

    /// Add a primitive (non-nullable) column
    pub fn add(self, name: impl Into<String>, type_code: TypeCode) -> Self {
        self.column(name, type_code, false, false)
    }

    /// Add a nullable column
    pub fn add_nullable(self, name: impl Into<String>, type_code: TypeCode) -> Self {
        self.column(name, type_code, true, false)
    }

    /// Build the schema
    pub fn build(self) -> Result<Schema> {
        Schema::new(self.entity_name, self.columns)
    }
}
