//! Deferred raw-SQL results.

mod common;

use common::{harness, seed_categories, Category};
use quarry::{params, PageRow, Row};

#[test]
fn test_nothing_runs_until_a_terminal_call() {
    let h = harness();
    seed_categories(&h.db, 3);
    h.log.clear();

    let list = h
        .db
        .by_sql::<Category>("SELECT * FROM categories WHERE id > ?", params![1]);
    assert_eq!(list.sql(), "SELECT * FROM categories WHERE id > ?");
    assert_eq!(h.log.len(), 0);

    let rows = list.all().unwrap();
    assert_eq!(rows.len(), 2);
    // `one` runs the statement as written.
    let first = list.one().unwrap().unwrap();
    assert_eq!(first.id, Some(2));
    assert_eq!(
        h.log.all(),
        [
            "SELECT * FROM categories WHERE id > ?",
            "SELECT * FROM categories WHERE id > ?",
        ]
    );
}

#[test]
fn test_scalar_rows() {
    let h = harness();
    seed_categories(&h.db, 4);

    let count: Option<i64> = h
        .db
        .by_sql("SELECT COUNT(*) FROM categories", Vec::new())
        .one()
        .unwrap();
    assert_eq!(count, Some(4));

    let names: Vec<String> = h
        .db
        .by_sql("SELECT name FROM categories WHERE id <= ? ORDER BY id", params![2])
        .all()
        .unwrap();
    assert_eq!(names, ["c1", "c2"]);

    let missing: Option<Option<String>> = h
        .db
        .by_sql("SELECT descr FROM categories WHERE id = ?", params![1])
        .one()
        .unwrap();
    assert_eq!(missing, Some(None));

    let none: Option<i64> = h
        .db
        .by_sql("SELECT id FROM categories WHERE id > 100", Vec::new())
        .one()
        .unwrap();
    assert_eq!(none, None);

    let rows: Vec<Row> = h
        .db
        .by_sql("SELECT id, name FROM categories ORDER BY id", Vec::new())
        .all()
        .unwrap();
    assert_eq!(rows[3].columns(), ["id", "name"]);
}

#[test]
fn test_maps() {
    let h = harness();
    seed_categories(&h.db, 1);
    let maps = h
        .db
        .by_sql::<Row>("SELECT id, name AS label FROM categories", Vec::new())
        .maps()
        .unwrap();
    assert_eq!(maps.len(), 1);
    assert_eq!(
        maps[0].get("label").and_then(quarry::value::as_text),
        Some("c1".to_string())
    );
}

#[test]
fn test_page_wraps_the_statement() {
    let h = harness();
    seed_categories(&h.db, 7);
    h.log.clear();
    let page = h
        .db
        .by_sql::<Category>("SELECT * FROM categories WHERE id > ?", params![2])
        .page(PageRow::new(2, 3))
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.rows[0].id, Some(6));
    assert_eq!(
        h.log.all(),
        [
            "SELECT COUNT(*) FROM (SELECT * FROM categories WHERE id > ?) tmp",
            "SELECT * FROM categories WHERE id > ? LIMIT 3 OFFSET 3",
        ]
    );

    let names = page.map(|c| c.name.unwrap_or_default());
    assert_eq!(names.rows, ["c6", "c7"]);
}

#[test]
fn test_raw_results_inside_a_transaction() {
    let h = harness();
    let outcome = h.db.atomic(|tx| {
        tx.execute("INSERT INTO categories(name) VALUES (?)", &params!["t"])?;
        tx.by_sql::<i64>("SELECT COUNT(*) FROM categories", Vec::new())
            .one()
    });
    assert_eq!(outcome.into_result().unwrap(), Some(1));
}
