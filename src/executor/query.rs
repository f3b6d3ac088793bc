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

//! Compiled queries
//!
//! A [`CompiledQuery`] is the build-once description of one repository
//! method: what to do ([`OpCode`]), which rows ([`CompiledCondition`]s and
//! join clauses), how to shape the answer (ordering, paging, projection,
//! grouping, [`ReturnKind`]) and which call-site arguments feed which slot.
//! It is immutable after [`QueryBuilder::build`] and shared across threads.

use std::fmt;

use crate::core::{Error, Operator, Result, Row, Value};
use crate::executor::condition::CompiledCondition;
use crate::executor::join::{CollectionKind, JoinPlan};
use crate::executor::sort::OrderBy;

/// Repository operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    FindById,
    FindAll,
    Find,
    Count,
    CountAll,
    Exists,
    ExistsById,
    /// Delete the entity passed as the first argument (a `Value::List` row)
    DeleteOne,
    DeleteAll,
    DeleteById,
    DeleteQuery,
    UpdateQuery,
    /// Delete every id of the `Value::List` passed as the first argument
    DeleteAllById,
}

impl OpCode {
    /// Returns true for operations that mutate the table
    pub fn is_modifying(&self) -> bool {
        matches!(
            self,
            OpCode::DeleteOne
                | OpCode::DeleteAll
                | OpCode::DeleteById
                | OpCode::DeleteQuery
                | OpCode::UpdateQuery
                | OpCode::DeleteAllById
        )
    }

    /// Returns true for operations driven by the condition list
    pub fn uses_conditions(&self) -> bool {
        matches!(
            self,
            OpCode::Find | OpCode::Count | OpCode::Exists | OpCode::DeleteQuery | OpCode::UpdateQuery
        )
    }

    fn default_return(&self) -> ReturnKind {
        match self {
            OpCode::FindById => ReturnKind::Optional,
            op if op.is_modifying() => ReturnKind::ModifyingCount,
            _ => ReturnKind::List,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpCode::FindById => "FIND_BY_ID",
            OpCode::FindAll => "FIND_ALL",
            OpCode::Find => "FIND",
            OpCode::Count => "COUNT",
            OpCode::CountAll => "COUNT_ALL",
            OpCode::Exists => "EXISTS",
            OpCode::ExistsById => "EXISTS_BY_ID",
            OpCode::DeleteOne => "DELETE_ONE",
            OpCode::DeleteAll => "DELETE_ALL",
            OpCode::DeleteById => "DELETE_BY_ID",
            OpCode::DeleteQuery => "DELETE_QUERY",
            OpCode::UpdateQuery => "UPDATE_QUERY",
            OpCode::DeleteAllById => "DELETE_ALL_BY_ID",
        };
        f.write_str(s)
    }
}

/// Value carried by each group of a grouped result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupValueKind {
    List,
    Set,
    Count,
}

/// Declared result shape of a find
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnKind {
    /// First row, absent is `None`
    One,
    Optional,
    List,
    /// Distinct rows in first-seen order
    Set,
    /// Grouped rows; requires a [`Grouping`]
    Map(GroupValueKind),
    ModifyingCount,
}

/// Relationship cardinality of a join clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    ManyToOne,
    OneToMany,
    ManyToMany,
}

/// One join of a query
///
/// `conditions` constrain the target table and read their arguments from the
/// same argument slots as the query's own conditions. With `fetch`, the
/// resolved target rows are appended to each result row as one extra column:
/// the target row (or `Null`) for many-to-one, a list of rows otherwise.
#[derive(Debug, Clone)]
pub struct JoinClause {
    /// Name of the related repository
    pub target: String,
    pub plan: JoinPlan,
    pub cardinality: Cardinality,
    pub conditions: Vec<CompiledCondition>,
    pub fetch: Option<CollectionKind>,
}

impl JoinClause {
    pub fn new(target: impl Into<String>, plan: JoinPlan, cardinality: Cardinality) -> Self {
        Self {
            target: target.into(),
            plan,
            cardinality,
            conditions: Vec::new(),
            fetch: None,
        }
    }

    /// Builder method to add a target-side condition
    pub fn with_condition(mut self, condition: CompiledCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Builder method to append the resolved targets to result rows
    pub fn with_fetch(mut self, kind: CollectionKind) -> Self {
        self.fetch = Some(kind);
        self
    }
}

/// Many-to-one hop of a projection path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionStep {
    /// Foreign key column on the current table
    pub fk_column: usize,
    /// Related repository whose id the key references
    pub target: String,
}

/// One projected output column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionItem {
    pub alias: String,
    pub steps: Vec<ProjectionStep>,
    /// Column read on the table reached after the last step
    pub column: usize,
}

impl ProjectionItem {
    pub fn column(alias: impl Into<String>, column: usize) -> Self {
        Self {
            alias: alias.into(),
            steps: Vec::new(),
            column,
        }
    }

    /// Builder method to navigate through a foreign key first
    pub fn through(mut self, fk_column: usize, target: impl Into<String>) -> Self {
        self.steps.push(ProjectionStep {
            fk_column,
            target: target.into(),
        });
        self
    }
}

/// Count filter of a count-valued grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Having {
    pub operator: Operator,
    pub arg_index: usize,
}

impl Having {
    /// Evaluate against a group's count
    pub fn accepts(&self, count: usize, args: &[Value]) -> Result<bool> {
        let bound = args
            .get(self.arg_index)
            .and_then(Value::as_integral)
            .ok_or_else(|| {
                Error::invalid_argument(format!(
                    "HAVING needs an integral argument at index {}",
                    self.arg_index
                ))
            })?;
        let count = count as i64;
        Ok(match self.operator {
            Operator::Eq => count == bound,
            Operator::Ne => count != bound,
            Operator::Gt => count > bound,
            Operator::Gte => count >= bound,
            Operator::Lt => count < bound,
            Operator::Lte => count <= bound,
            other => {
                return Err(Error::not_supported(format!("HAVING {}", other)));
            }
        })
    }
}

/// GROUP BY description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
    pub key_columns: Vec<usize>,
    pub value: GroupValueKind,
    pub having: Option<Having>,
}

impl Grouping {
    pub fn new(key_columns: Vec<usize>, value: GroupValueKind) -> Self {
        Self {
            key_columns,
            value,
            having: None,
        }
    }

    /// Builder method to filter groups by count
    pub fn having(mut self, operator: Operator, arg_index: usize) -> Self {
        self.having = Some(Having {
            operator,
            arg_index,
        });
        self
    }
}

/// SET assignment of an update-by-query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub column: usize,
    pub arg_index: usize,
}

/// Immutable description of one repository method
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub op: OpCode,
    pub return_kind: ReturnKind,
    pub conditions: Vec<CompiledCondition>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub offset: usize,
    pub distinct: bool,
    pub joins: Vec<JoinClause>,
    pub projection: Vec<ProjectionItem>,
    pub grouping: Option<Grouping>,
    pub updates: Vec<Assignment>,
    /// Caller argument feeding each slot; `None` slots take `bound_values`
    pub parameter_indices: Vec<Option<usize>>,
    /// Compile-time literals
    pub bound_values: Vec<Value>,
}

impl CompiledQuery {
    pub fn builder(op: OpCode) -> QueryBuilder {
        QueryBuilder::new(op)
    }

    /// Resolve the argument slots for one call
    ///
    /// Without a slot mapping the caller arguments are used as-is.
    pub fn bind(&self, args: &[Value]) -> Result<Row> {
        if self.parameter_indices.is_empty() && self.bound_values.is_empty() {
            return Ok(args.to_vec());
        }
        let slots = self.parameter_indices.len().max(self.bound_values.len());
        (0..slots)
            .map(|slot| match self.parameter_indices.get(slot).copied().flatten() {
                Some(param) => args.get(param).cloned().ok_or_else(|| {
                    Error::invalid_argument(format!(
                        "slot {} expects argument {} but only {} were passed",
                        slot,
                        param,
                        args.len()
                    ))
                }),
                None => self.bound_values.get(slot).cloned().ok_or_else(|| {
                    Error::invalid_argument(format!("slot {} has no argument or literal", slot))
                }),
            })
            .collect()
    }
}

/// Builder of [`CompiledQuery`]
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    query: CompiledQuery,
    return_kind: Option<ReturnKind>,
}

impl QueryBuilder {
    pub fn new(op: OpCode) -> Self {
        Self {
            query: CompiledQuery {
                op,
                return_kind: op.default_return(),
                conditions: Vec::new(),
                order_by: Vec::new(),
                limit: None,
                offset: 0,
                distinct: false,
                joins: Vec::new(),
                projection: Vec::new(),
                grouping: None,
                updates: Vec::new(),
                parameter_indices: Vec::new(),
                bound_values: Vec::new(),
            },
            return_kind: None,
        }
    }

    pub fn condition(mut self, condition: CompiledCondition) -> Self {
        self.query.conditions.push(condition);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.query.order_by.push(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = offset;
        self
    }

    pub fn distinct(mut self) -> Self {
        self.query.distinct = true;
        self
    }

    pub fn join(mut self, join: JoinClause) -> Self {
        self.query.joins.push(join);
        self
    }

    pub fn project(mut self, item: ProjectionItem) -> Self {
        self.query.projection.push(item);
        self
    }

    pub fn group_by(mut self, grouping: Grouping) -> Self {
        self.return_kind
            .get_or_insert(ReturnKind::Map(grouping.value));
        self.query.grouping = Some(grouping);
        self
    }

    pub fn set(mut self, column: usize, arg_index: usize) -> Self {
        self.query.updates.push(Assignment { column, arg_index });
        self
    }

    pub fn returns(mut self, kind: ReturnKind) -> Self {
        self.return_kind = Some(kind);
        self
    }

    /// Feed slot `slot` from caller argument `param`
    pub fn parameter(mut self, slot: usize, param: usize) -> Self {
        if self.query.parameter_indices.len() <= slot {
            self.query.parameter_indices.resize(slot + 1, None);
        }
        self.query.parameter_indices[slot] = Some(param);
        self
    }

    /// Fill slot `slot` with a compile-time literal
    pub fn literal(mut self, slot: usize, value: Value) -> Self {
        if self.query.bound_values.len() <= slot {
            self.query.bound_values.resize(slot + 1, Value::Null);
        }
        self.query.bound_values[slot] = value;
        self
    }

    /// Validate the shape and freeze the query
    pub fn build(mut self) -> Result<CompiledQuery> {
        if let Some(kind) = self.return_kind {
            self.query.return_kind = kind;
        }
        let query = self.query;
        for join in &query.joins {
            join.plan.validate()?;
            if join.cardinality == Cardinality::ManyToMany && join.plan.join_table.is_none() {
                return Err(Error::MissingConfiguration(format!(
                    "many-to-many join onto {} has no join table",
                    join.target
                )));
            }
        }
        match (&query.grouping, query.return_kind) {
            (Some(grouping), ReturnKind::Map(value)) if grouping.value == value => {
                if let Some(having) = grouping.having {
                    if grouping.value != GroupValueKind::Count {
                        return Err(Error::not_supported(
                            "HAVING is only supported on count-valued groupings",
                        ));
                    }
                    if !matches!(
                        having.operator,
                        Operator::Eq
                            | Operator::Ne
                            | Operator::Gt
                            | Operator::Gte
                            | Operator::Lt
                            | Operator::Lte
                    ) {
                        return Err(Error::not_supported(format!(
                            "HAVING {} is not supported",
                            having.operator
                        )));
                    }
                }
                if grouping.key_columns.is_empty() {
                    return Err(Error::invalid_argument("grouping needs at least one key column"));
                }
            }
            (None, ReturnKind::Map(_)) | (Some(_), _) => {
                return Err(Error::invalid_argument(
                    "grouped results need both a grouping and a map return kind",
                ));
            }
            (None, _) => {}
        }
        if query.op == OpCode::UpdateQuery && query.updates.is_empty() {
            return Err(Error::invalid_argument("update query has no assignments"));
        }
        if query.op != OpCode::UpdateQuery && !query.updates.is_empty() {
            return Err(Error::invalid_argument(format!(
                "{} cannot carry SET assignments",
                query.op
            )));
        }
        Ok(query)
    }
}

/// Groups' values
#[derive(Debug, Clone, PartialEq)]
pub enum GroupValue {
    List(Vec<Row>),
    Set(Vec<Row>),
    Count(usize),
}

/// Outcome of executing a query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Single(Option<Row>),
    List(Vec<Row>),
    Set(Vec<Row>),
    /// Groups in first-seen order
    Grouped(Vec<(Row, GroupValue)>),
    Count(usize),
    Exists(bool),
    Modified(usize),
}

impl QueryResult {
    /// Rows of a single, list or set result
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            QueryResult::Single(row) => row.into_iter().collect(),
            QueryResult::List(rows) | QueryResult::Set(rows) => rows,
            _ => Vec::new(),
        }
    }

    /// Count, modified count or existence as a number
    pub fn count(&self) -> Option<usize> {
        match self {
            QueryResult::Count(n) | QueryResult::Modified(n) => Some(*n),
            QueryResult::Exists(b) => Some(*b as usize),
            _ => None,
        }
    }
}
