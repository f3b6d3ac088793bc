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

//! Index selection dispatcher
//!
//! Resolves a compiled condition list to rows. Each OR-separated AND-group is
//! evaluated as "lead selection + residual filter":
//!
//! 1. a composite index probe answering two or more conditions, else
//! 2. a single-column index probe for the first index-addressable condition,
//!    else
//! 3. a direct scan of the group's first condition.
//!
//! Every remaining condition of the group is then tested row by row against
//! the lead candidates only. Groups are unioned.

use std::ops::{Bound, Range};

use log::{debug, trace};

use crate::common::RowIdSet;
use crate::core::{Operator, Result, RowRef, Schema, Value};
use crate::executor::composite::probe_composite;
use crate::executor::condition::{
    matches_all, split_groups, CompiledCondition, ConditionProgram, RowEvaluator,
};
use crate::executor::handlers::TypeHandlerRegistry;
use crate::executor::predicate::ColumnPredicate;
use crate::storage::{GeneratedTable, Index, IndexKey, KeyPart, Selection, TableIndexes};

/// Compiled condition list with its AND-group boundaries
#[derive(Debug, Clone, Default)]
pub struct ConditionSet {
    programs: Vec<ConditionProgram>,
    groups: Vec<Range<usize>>,
}

impl ConditionSet {
    /// Compile every condition against `schema`
    pub fn compile(
        conditions: &[CompiledCondition],
        registry: &TypeHandlerRegistry,
        schema: &Schema,
    ) -> Result<Self> {
        let programs = conditions
            .iter()
            .map(|c| {
                let column = schema.column(c.column)?;
                ConditionProgram::compile(c.clone(), registry, column.nullable)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            groups: split_groups(conditions),
            programs,
        })
    }

    /// Returns true if there is no condition (every live row matches)
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn programs(&self) -> &[ConditionProgram] {
        &self.programs
    }

    fn group(&self, range: &Range<usize>) -> &[ConditionProgram] {
        &self.programs[range.clone()]
    }
}

/// Lead candidates plus the conditions still to check
struct GroupPlan {
    lead: Selection,
    residual: Vec<RowEvaluator>,
}

impl GroupPlan {
    fn empty() -> Self {
        Self {
            lead: Selection::empty(),
            residual: Vec::new(),
        }
    }
}

/// Evaluates condition sets against one table and its indexes
#[derive(Clone, Copy)]
pub struct Dispatcher<'a> {
    table: &'a dyn GeneratedTable,
    indexes: &'a TableIndexes,
    bitset_threshold: usize,
}

impl<'a> Dispatcher<'a> {
    pub fn new(table: &'a dyn GeneratedTable, indexes: &'a TableIndexes, bitset_threshold: usize) -> Self {
        Self {
            table,
            indexes,
            bitset_threshold,
        }
    }

    /// Rows matching the condition set
    pub fn select(&self, conditions: &ConditionSet, args: &[Value]) -> Result<Selection> {
        if conditions.is_empty() {
            return Ok(Selection::all(self.table));
        }
        let mut result = Selection::empty();
        for range in &conditions.groups {
            let group = self.select_group(conditions.group(range), args)?;
            result = result.union(&group);
        }
        Ok(result)
    }

    /// True as soon as any group yields a row
    pub fn exists(&self, conditions: &ConditionSet, args: &[Value]) -> Result<bool> {
        if conditions.is_empty() {
            return Ok(self.table.live_count() > 0);
        }
        for range in &conditions.groups {
            let plan = self.plan_group(conditions.group(range), args)?;
            if plan.lead.is_empty() {
                continue;
            }
            if plan
                .lead
                .iter()
                .any(|row| matches_all(self.table, row, &plan.residual))
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Number of distinct rows matching the condition set
    pub fn count(&self, conditions: &ConditionSet, args: &[Value]) -> Result<usize> {
        if conditions.is_empty() {
            return Ok(self.table.live_count());
        }
        let mut accumulator = RowIdSet::new(self.bitset_threshold);
        for range in &conditions.groups {
            let plan = self.plan_group(conditions.group(range), args)?;
            let rows = plan
                .lead
                .iter()
                .filter(|row| matches_all(self.table, *row, &plan.residual))
                .map(|row| row.index());
            accumulator.union_with(&RowIdSet::from_rows(rows, self.bitset_threshold));
        }
        Ok(accumulator.len())
    }

    fn select_group(&self, group: &[ConditionProgram], args: &[Value]) -> Result<Selection> {
        let plan = self.plan_group(group, args)?;
        if plan.residual.is_empty() {
            return Ok(plan.lead);
        }
        Ok(plan
            .lead
            .filter(|row| matches_all(self.table, row, &plan.residual)))
    }

    fn plan_group(&self, group: &[ConditionProgram], args: &[Value]) -> Result<GroupPlan> {
        // Binding every predicate first validates all arguments before any scan
        let evaluators = group
            .iter()
            .map(|p| p.row_evaluator(args))
            .collect::<Result<Vec<_>>>()?;
        if evaluators.iter().any(RowEvaluator::is_unsatisfiable) {
            trace!("group short-circuited: unsatisfiable condition");
            return Ok(GroupPlan::empty());
        }

        if !self.indexes.is_empty() {
            if let Some(probe) = probe_composite(self.table, self.indexes, &evaluators)? {
                return Ok(GroupPlan {
                    lead: probe.selection,
                    residual: without(evaluators, &probe.consumed),
                });
            }
            for (i, program) in group.iter().enumerate() {
                if let Some(lead) = self.probe_single(program, &evaluators[i], args)? {
                    return Ok(GroupPlan {
                        lead,
                        residual: without(evaluators, &[i]),
                    });
                }
            }
        }

        trace!("no index for group of {}, scanning {}", group.len(), group[0].condition());
        let lead = evaluators[0].predicate().scan(self.table);
        Ok(GroupPlan {
            lead,
            residual: without(evaluators, &[0]),
        })
    }

    /// Single-column index probe; `None` if no index can answer the condition
    fn probe_single(
        &self,
        program: &ConditionProgram,
        evaluator: &RowEvaluator,
        args: &[Value],
    ) -> Result<Option<Selection>> {
        let condition = program.condition();
        let Some(index) = self.indexes.single_column(condition.column, condition.operator) else {
            return Ok(None);
        };
        let mut refs: Vec<RowRef> = Vec::new();
        let probed = match (condition.operator, evaluator.predicate()) {
            (Operator::StartingWith | Operator::EndingWith, _) if condition.ignore_case => false,
            (Operator::StartingWith, _) | (Operator::EndingWith, _) => {
                let stored = program.handler().convert_value(program.decode(args)?.scalar())?;
                if let Some(text) = stored.as_str() {
                    if condition.operator == Operator::StartingWith {
                        index.find_prefix_into(text, &mut refs)?;
                    } else {
                        index.find_suffix_into(text, &mut refs)?;
                    }
                }
                true
            }
            (_, predicate) => probe_predicate(index.as_ref(), predicate, &mut refs)?,
        };
        if !probed {
            return Ok(None);
        }
        debug!(
            "index '{}' answered {} with {} postings",
            index.name(),
            condition,
            refs.len()
        );
        Ok(Some(Selection::from_live_refs(self.table, refs)))
    }
}

/// Equality, IN and range probes driven by the compiled predicate
fn probe_predicate(index: &dyn Index, predicate: &ColumnPredicate, out: &mut Vec<RowRef>) -> Result<bool> {
    let long_key = |v: i64| IndexKey::single(KeyPart::Long(v));
    match predicate {
        ColumnPredicate::Range { lower, upper, .. } if lower == upper => {
            index.find_equal_into(&long_key(*lower), out)?;
        }
        ColumnPredicate::Range { lower, upper, .. } => {
            index.find_range_into(
                Bound::Included(&long_key(*lower)),
                Bound::Included(&long_key(*upper)),
                out,
            )?;
        }
        ColumnPredicate::NumericIn { values, .. } => {
            let keys: Vec<IndexKey> = values.iter().map(|v| long_key(*v)).collect();
            index.find_in_into(&keys, out)?;
        }
        ColumnPredicate::StringEq { value, .. } => {
            index.find_equal_into(&IndexKey::single(KeyPart::Str(value.clone())), out)?;
        }
        ColumnPredicate::StringIn { values, .. } => {
            let keys: Vec<IndexKey> = values
                .iter()
                .map(|v| IndexKey::single(KeyPart::Str(v.clone())))
                .collect();
            index.find_in_into(&keys, out)?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn without(evaluators: Vec<RowEvaluator>, consumed: &[usize]) -> Vec<RowEvaluator> {
    evaluators
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !consumed.contains(i))
        .map(|(_, e)| e)
        .collect()
}
