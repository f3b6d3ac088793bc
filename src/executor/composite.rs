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

//! Composite index probing
//!
//! A composite index answers several conditions of one AND-group with a
//! single probe:
//!
//! - hash: every indexed column constrained by an equality
//! - range: an equality prefix, optionally followed by one range condition on
//!   the next column; `Min`/`Max` sentinels pad the remaining key parts
//!
//! Conditions are read from their compiled predicates, so ignore-case
//! comparisons (pattern predicates) never take part.

use std::ops::Bound;

use log::debug;

use crate::core::{IndexKind, Result, RowRef};
use crate::executor::condition::RowEvaluator;
use crate::executor::predicate::ColumnPredicate;
use crate::storage::{GeneratedTable, Index, IndexKey, KeyPart, Selection, TableIndexes};

/// Outcome of a composite probe
#[derive(Debug)]
pub struct CompositeProbe {
    /// Live rows returned by the index
    pub selection: Selection,
    /// Positions (within the group) of the conditions the probe answered
    pub consumed: Vec<usize>,
    pub index_name: String,
}

/// Equality key part of a predicate, if it is an equality
fn equality_part(predicate: &ColumnPredicate) -> Option<KeyPart> {
    match predicate {
        ColumnPredicate::Range { lower, upper, .. } if lower == upper => {
            Some(KeyPart::Long(*lower))
        }
        ColumnPredicate::StringEq { value, .. } => Some(KeyPart::Str(value.clone())),
        _ => None,
    }
}

/// Inclusive numeric bounds of a predicate, if it is a proper range
fn range_bounds(predicate: &ColumnPredicate) -> Option<(i64, i64)> {
    match predicate {
        ColumnPredicate::Range { lower, upper, .. } if lower < upper => Some((*lower, *upper)),
        _ => None,
    }
}

/// First unconsumed condition on `column` accepted by `extract`
fn find_condition<T>(
    evaluators: &[RowEvaluator],
    used: &[usize],
    column: usize,
    extract: impl Fn(&ColumnPredicate) -> Option<T>,
) -> Option<(usize, T)> {
    evaluators.iter().enumerate().find_map(|(i, e)| {
        if used.contains(&i) || e.predicate().column() != Some(column) {
            return None;
        }
        extract(e.predicate()).map(|t| (i, t))
    })
}

/// A probe of one composite index: bounds plus the conditions it consumes
struct ProbePlan {
    lower: IndexKey,
    upper: IndexKey,
    equality: bool,
    consumed: Vec<usize>,
}

fn plan_for(index: &dyn Index, evaluators: &[RowEvaluator]) -> Option<ProbePlan> {
    let columns = index.column_positions();
    let mut prefix = Vec::with_capacity(columns.len());
    let mut consumed = Vec::with_capacity(columns.len());
    for &column in columns {
        match find_condition(evaluators, &consumed, column, equality_part) {
            Some((i, part)) => {
                prefix.push(part);
                consumed.push(i);
            }
            None => break,
        }
    }

    if prefix.len() == columns.len() {
        let key = IndexKey::from_parts(prefix);
        return Some(ProbePlan {
            lower: key.clone(),
            upper: key,
            equality: true,
            consumed,
        });
    }
    if index.kind() != IndexKind::Range || prefix.is_empty() {
        return None;
    }

    let mut lower = prefix.clone();
    let mut upper = prefix;
    if let Some((i, (lo, hi))) =
        find_condition(evaluators, &consumed, columns[lower.len()], range_bounds)
    {
        lower.push(KeyPart::Long(lo));
        upper.push(KeyPart::Long(hi));
        consumed.push(i);
    }
    if consumed.len() < 2 {
        return None;
    }
    lower.resize(columns.len(), KeyPart::Min);
    upper.resize(columns.len(), KeyPart::Max);
    Some(ProbePlan {
        lower: IndexKey::from_parts(lower),
        upper: IndexKey::from_parts(upper),
        equality: false,
        consumed,
    })
}

/// Probe the composite index answering the most conditions of the group
///
/// Returns `None` when no composite index covers at least two conditions.
pub fn probe_composite(
    table: &dyn GeneratedTable,
    indexes: &TableIndexes,
    evaluators: &[RowEvaluator],
) -> Result<Option<CompositeProbe>> {
    let best = indexes
        .composites()
        .filter_map(|index| plan_for(index.as_ref(), evaluators).map(|plan| (index, plan)))
        .max_by_key(|(_, plan)| plan.consumed.len());
    let Some((index, plan)) = best else {
        return Ok(None);
    };

    let mut refs: Vec<RowRef> = Vec::new();
    if plan.equality {
        index.find_equal_into(&plan.lower, &mut refs)?;
    } else {
        index.find_range_into(
            Bound::Included(&plan.lower),
            Bound::Included(&plan.upper),
            &mut refs,
        )?;
    }
    debug!(
        "composite index '{}' answered {} conditions with {} postings",
        index.name(),
        plan.consumed.len(),
        refs.len()
    );
    Ok(Some(CompositeProbe {
        selection: Selection::from_live_refs(table, refs),
        consumed: plan.consumed,
        index_name: index.name().to_string(),
    }))
}
