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

//! Join resolution properties

use std::sync::Arc;

use memris::executor::{
    Cardinality, CollectionKind, CompiledCondition, JoinClause, JoinPlan, JoinTable, ManyToOne,
    Membership, OpCode,
};
use memris::{
    ColumnarTable, CompiledQuery, Config, GeneratedTable, JoinType, Operator, RepositoryRuntime,
    Row, SchemaBuilder, Selection, TableConfig, TableIndexes, TypeCode, TypeHandlerRegistry, Value,
};

fn setup_runtime(schema: memris::Schema) -> RepositoryRuntime {
    let _ = env_logger::builder().is_test(true).try_init();
    let table = Arc::new(ColumnarTable::new(schema.clone(), Config::small().table));
    RepositoryRuntime::new(
        table,
        schema,
        TableIndexes::default(),
        Arc::new(TypeHandlerRegistry::with_defaults()),
        Config::small(),
    )
    .expect("Failed to create runtime")
}

fn setup_authors() -> Arc<RepositoryRuntime> {
    let schema = SchemaBuilder::new("Author")
        .add_id("id", TypeCode::Long)
        .add("name", TypeCode::String)
        .build()
        .expect("Failed to build schema");
    let runtime = setup_runtime(schema);
    for (id, name) in [(1, "le guin"), (2, "banks"), (3, "jemisin")] {
        runtime
            .save(vec![Value::Long(id), Value::text(name)])
            .expect("Save failed");
    }
    Arc::new(runtime)
}

fn setup_books(authors: Arc<RepositoryRuntime>) -> RepositoryRuntime {
    let schema = SchemaBuilder::new("Book")
        .add_id("id", TypeCode::Long)
        .add("title", TypeCode::String)
        .add_nullable("author_id", TypeCode::Long)
        .build()
        .expect("Failed to build schema");
    let runtime = setup_runtime(schema).with_related("author", authors);
    let books = [
        ("dispossessed", Some(1)),
        ("excession", Some(2)),
        ("lathe", Some(1)),
        ("anonymous", None),
        ("orphan", Some(42)),
        ("player of games", Some(2)),
    ];
    for (title, author) in books {
        runtime
            .save(vec![
                Value::Null,
                Value::text(title),
                author.map(Value::Long).unwrap_or(Value::Null),
            ])
            .expect("Save failed");
    }
    runtime
}

fn titles(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .map(|r| r[1].as_str().expect("title").to_string())
        .collect()
}

#[test]
fn test_inner_join_subset_left_join_cardinality() {
    let authors = setup_authors();
    let books = setup_books(Arc::clone(&authors));
    let source = Selection::all(books.table());

    let inner = JoinPlan::to_id(2, TypeCode::Long, 0);
    let joined = ManyToOne::new(books.table(), authors.table(), &inner)
        .expect("Valid join")
        .resolve(&source, None);
    assert_eq!(joined.len(), 4);
    assert!(joined.iter().all(|j| source.contains(j.source)));

    let left = inner.clone().with_join_type(JoinType::Left);
    let joined = ManyToOne::new(books.table(), authors.table(), &left)
        .expect("Valid join")
        .resolve(&source, None);
    assert_eq!(joined.len(), source.len());
    assert_eq!(joined.iter().filter(|j| j.target.is_none()).count(), 2);
}

#[test]
fn test_join_predicate_through_runtime() {
    let authors = setup_authors();
    let books = setup_books(authors);
    let join = JoinClause::new("author", JoinPlan::to_id(2, TypeCode::Long, 0), Cardinality::ManyToOne)
        .with_condition(CompiledCondition::new(1, TypeCode::String, Operator::StartingWith, 0))
        .with_fetch(CollectionKind::List);
    let query = CompiledQuery::builder(OpCode::FindAll)
        .join(join)
        .build()
        .expect("Build failed");
    let prepared = books.prepare(query).expect("Prepare failed");
    let rows = books
        .execute(&prepared, &[Value::text("ba")])
        .expect("Execute failed")
        .into_rows();
    assert_eq!(titles(&rows), vec!["excession", "player of games"]);
    assert_eq!(rows[0][3], Value::list([Value::Long(2), Value::text("banks")]));
}

#[test]
fn test_deleted_target_is_absent() {
    let authors = setup_authors();
    let books = setup_books(Arc::clone(&authors));
    assert!(authors.delete_by_id(&Value::Long(2)).expect("Delete failed"));
    let join = JoinClause::new("author", JoinPlan::to_id(2, TypeCode::Long, 0), Cardinality::ManyToOne);
    let query = CompiledQuery::builder(OpCode::Count)
        .join(join)
        .build()
        .expect("Build failed");
    let prepared = books.prepare(query).expect("Prepare failed");
    let result = books.execute(&prepared, &[]).expect("Execute failed");
    assert_eq!(result.count(), Some(2));
}

fn setup_links(pairs: &[(i64, i64)]) -> ColumnarTable {
    let schema = SchemaBuilder::new("BookAuthor")
        .add_id("id", TypeCode::Long)
        .add("book_id", TypeCode::Int)
        .add("author_id", TypeCode::Int)
        .build()
        .expect("Failed to build schema");
    let table = ColumnarTable::new(schema, TableConfig::new());
    for (i, (book, author)) in pairs.iter().enumerate() {
        table
            .insert_from(&[Value::Long(i as i64), Value::Int(*book as i32), Value::Int(*author as i32)])
            .expect("Insert failed");
    }
    table
}

#[test]
fn test_many_to_many_permutation_invariance() {
    let authors = setup_authors();
    let books = setup_books(Arc::clone(&authors));
    let spec = JoinTable::new("book_authors", 1, 2);
    let pairs = [(1, 1), (2, 2), (2, 3), (3, 1), (3, 3), (6, 2), (1, 1)];

    let mut permutations = vec![pairs.to_vec()];
    let mut reversed = pairs.to_vec();
    reversed.reverse();
    permutations.push(reversed);
    let mut rotated = pairs.to_vec();
    rotated.rotate_left(3);
    permutations.push(rotated);

    let hydrated: Vec<Vec<Vec<_>>> = permutations
        .iter()
        .map(|pairs| {
            let links = setup_links(pairs);
            let membership = Membership::build(&links, &spec, authors.table(), None);
            Selection::all(books.table())
                .iter()
                .map(|book| membership.hydrate_rows(books.table(), book))
                .collect()
        })
        .collect();
    assert!(hydrated.windows(2).all(|w| w[0] == w[1]));
    // book 2 has two distinct authors, book 1 one author despite the duplicate link
    assert_eq!(hydrated[0][1].len(), 2);
    assert_eq!(hydrated[0][0].len(), 1);
}

#[test]
fn test_many_to_many_through_runtime() {
    let authors = setup_authors();
    let links_schema = SchemaBuilder::new("BookAuthor")
        .add_id("id", TypeCode::Long)
        .add("book_id", TypeCode::Long)
        .add("author_id", TypeCode::Long)
        .build()
        .expect("Failed to build schema");
    let links = setup_runtime(links_schema);
    for (book, author) in [(1, 1), (2, 2), (2, 3), (3, 1)] {
        links
            .save(vec![Value::Null, Value::Long(book), Value::Long(author)])
            .expect("Save failed");
    }
    let books = setup_books(Arc::clone(&authors)).with_related("book_authors", Arc::new(links));
    let join = JoinClause::new(
        "author",
        JoinPlan::to_id(0, TypeCode::Long, 0).with_join_table(JoinTable::new("book_authors", 1, 2)),
        Cardinality::ManyToMany,
    )
    .with_condition(CompiledCondition::new(1, TypeCode::String, Operator::Eq, 0))
    .with_fetch(CollectionKind::Set);
    let query = CompiledQuery::builder(OpCode::FindAll)
        .join(join)
        .build()
        .expect("Build failed");
    let prepared = books.prepare(query).expect("Prepare failed");
    let rows = books
        .execute(&prepared, &[Value::text("jemisin")])
        .expect("Execute failed")
        .into_rows();
    assert_eq!(titles(&rows), vec!["excession"]);
    assert_eq!(
        rows[0][3],
        Value::list([Value::list([Value::Long(3), Value::text("jemisin")])])
    );
}

#[test]
fn test_right_and_full_joins_are_rejected() {
    for join_type in [JoinType::Right, JoinType::Full] {
        let join = JoinClause::new(
            "author",
            JoinPlan::to_id(2, TypeCode::Long, 0).with_join_type(join_type),
            Cardinality::ManyToOne,
        );
        let err = CompiledQuery::builder(OpCode::FindAll)
            .join(join)
            .build()
            .unwrap_err();
        assert!(err.is_not_supported());
    }
}
