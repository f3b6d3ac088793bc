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

//! Sort and top-K properties over a generated table

use memris::executor::{order_and_page, sort_rows, top_k, OrderBy};
use memris::{
    ColumnarTable, Config, GeneratedTable, RowRef, SchemaBuilder, Selection, TableConfig, TypeCode,
    Value,
};

const ROWS: i64 = 600;

fn setup_table() -> ColumnarTable {
    let schema = SchemaBuilder::new("Measurement")
        .add_id("id", TypeCode::Long)
        .add_nullable("reading", TypeCode::Double)
        .add("bucket", TypeCode::Int)
        .add_nullable("label", TypeCode::String)
        .build()
        .expect("Failed to build schema");
    let table = ColumnarTable::new(schema, TableConfig::new());
    for id in 0..ROWS {
        let reading = match id % 11 {
            0 => Value::Null,
            1 => Value::Double(-0.0),
            n => Value::Double((id * 37 % 101) as f64 * if n % 2 == 0 { -0.5 } else { 1.25 }),
        };
        let label = if id % 7 == 0 {
            Value::Null
        } else {
            Value::text(format!("L{:03}", id * 13 % 97))
        };
        table
            .insert_from(&[Value::Long(id), reading, Value::Int((id % 5) as i32), label])
            .expect("Insert failed");
    }
    table
}

fn all(table: &ColumnarTable) -> Vec<RowRef> {
    Selection::all(table).into_refs()
}

#[test]
fn test_top_k_is_prefix_of_full_sort() {
    let table = setup_table();
    let rows = all(&table);
    let config = Config::small();
    let orders = [
        vec![OrderBy::asc(1)],
        vec![OrderBy::desc(1)],
        vec![OrderBy::desc(2), OrderBy::asc(3)],
        vec![OrderBy::asc(3), OrderBy::desc(1)],
    ];
    for order in &orders {
        let full = sort_rows(&table, &rows, order, &config);
        for k in [0, 1, 2, 17, 100, 599, 600, 1000] {
            let top = top_k(&table, &rows, order, k, &config);
            assert_eq!(top, full[..k.min(full.len())], "k={} order={:?}", k, order);
        }
    }
}

#[test]
fn test_nulls_last_in_both_directions() {
    let table = setup_table();
    let rows = all(&table);
    let config = Config::small();
    for order in [OrderBy::asc(1), OrderBy::desc(1), OrderBy::asc(3), OrderBy::desc(3)] {
        let sorted = sort_rows(&table, &rows, &[order], &config);
        let first_null = sorted
            .iter()
            .position(|r| !table.is_present(order.column, r.index()))
            .expect("table has nulls");
        assert!(sorted[first_null..]
            .iter()
            .all(|r| !table.is_present(order.column, r.index())));
        // null ties keep ascending row order
        assert!(sorted[first_null..].windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn test_direction_reversal() {
    let table = setup_table();
    let rows = all(&table);
    let config = Config::small();
    let key = |r: &RowRef| table.read_storage(1, r.index());
    let asc = sort_rows(&table, &rows, &[OrderBy::asc(1)], &config);
    let desc = sort_rows(&table, &rows, &[OrderBy::desc(1)], &config);

    let mut asc_keys: Vec<_> = asc.iter().map(key).filter(|k| !k.is_null()).collect();
    let mut desc_keys: Vec<_> = desc.iter().map(key).filter(|k| !k.is_null()).collect();
    asc_keys.dedup();
    desc_keys.dedup();
    asc_keys.reverse();
    assert_eq!(asc_keys, desc_keys);

    // within one key, both directions list rows in ascending row order
    for window in desc.windows(2) {
        if key(&window[0]) == key(&window[1]) {
            assert!(window[0] < window[1]);
        }
    }
}

#[test]
fn test_parallel_sort_matches_sequential() {
    let table = setup_table();
    let rows = all(&table);
    let order = [OrderBy::desc(2), OrderBy::asc(1)];
    let sequential = sort_rows(&table, &rows, &order, &Config::small());
    let parallel = sort_rows(
        &table,
        &rows,
        &order,
        &Config::new().with_parallel_sort_threshold(10),
    );
    assert_eq!(sequential, parallel);
}

#[test]
fn test_paging_after_order() {
    let table = setup_table();
    let rows = all(&table);
    let config = Config::small();
    let order = [OrderBy::asc(3)];
    let full = sort_rows(&table, &rows, &order, &config);
    let page = order_and_page(&table, &rows, &order, 40, Some(25), &config);
    assert_eq!(page, full[40..65]);
    let tail = order_and_page(&table, &rows, &order, 590, Some(25), &config);
    assert_eq!(tail, full[590..]);
}
