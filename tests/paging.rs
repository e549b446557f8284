//! Count-then-fetch pagination.

mod common;

use common::{harness, harness_with, seed_categories, Category};
use quarry::dialect::MySqlDialect;
use quarry::{OrderBy, PageRow};

#[test]
fn test_pages_over_twenty_five_rows() {
    let h = harness();
    seed_categories(&h.db, 25);

    let first = h.db.query::<Category>().page(1, 10).unwrap();
    assert_eq!(first.total, 25);
    assert_eq!(first.rows.len(), 10);
    assert_eq!(first.page_count(), 3);
    assert!(first.has_next());
    assert!(!first.has_prev());

    let last = h.db.query::<Category>().page(3, 10).unwrap();
    assert_eq!(last.rows.len(), 5);
    assert_eq!(last.rows[0].name.as_deref(), Some("c21"));
    assert!(!last.has_next());
    assert_eq!(last.prev_page(), Some(2));
}

#[test]
fn test_empty_table_skips_the_row_query() {
    let h = harness();
    h.log.clear();
    let page = h.db.query::<Category>().page(1, 10).unwrap();
    assert_eq!(page.total, 0);
    assert!(page.is_empty());
    assert_eq!(h.log.all(), ["SELECT COUNT(*) FROM categories"]);
}

#[test]
fn test_page_statements() {
    let h = harness();
    seed_categories(&h.db, 12);
    h.log.clear();
    let page = h
        .db
        .query::<Category>()
        .gt(Category::ID, 1)
        .order_by(Category::ID, OrderBy::Desc)
        .page(2, 5)
        .unwrap();
    assert_eq!(page.total, 11);
    assert_eq!(page.rows.first().and_then(|c| c.id), Some(7));
    assert_eq!(
        h.log.all(),
        [
            "SELECT COUNT(*) FROM categories WHERE id > ?",
            "SELECT * FROM categories WHERE id > ? ORDER BY id DESC LIMIT 5 OFFSET 5",
        ]
    );
}

#[test]
fn test_page_sql_rewrites_or_wraps_the_count() {
    let h = harness();
    seed_categories(&h.db, 4);
    let sql = "SELECT id, name FROM categories WHERE id > ?";

    h.log.clear();
    let page = h
        .db
        .query::<Category>()
        .gt("id", 0)
        .page_sql(sql, PageRow::new(1, 3))
        .unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.rows.len(), 3);
    assert_eq!(
        h.log.all()[0],
        "SELECT COUNT(*) FROM categories WHERE id > ?"
    );

    h.log.clear();
    let mut query = h.db.query::<Category>().use_sql();
    let page = query
        .page_sql("SELECT * FROM categories WHERE id > 2", PageRow::new(1, 10))
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(
        h.log.all()[0],
        "SELECT COUNT(*) FROM (SELECT * FROM categories WHERE id > 2) tmp"
    );

    // The mode outlives the terminal call.
    h.log.clear();
    query
        .page_sql("SELECT * FROM categories", PageRow::new(1, 10))
        .unwrap();
    assert_eq!(
        h.log.all()[0],
        "SELECT COUNT(*) FROM (SELECT * FROM categories) tmp"
    );
}

#[test]
fn test_mysql_page_syntax() {
    let h = harness_with(|b| b.dialect(MySqlDialect));
    seed_categories(&h.db, 3);
    h.log.clear();
    // SQLite accepts the `LIMIT offset,size` form as well.
    let page = h.db.query::<Category>().page(2, 2).unwrap();
    assert_eq!(page.rows.len(), 1);
    assert_eq!(h.log.last().unwrap(), "SELECT * FROM categories LIMIT 2,2");
}
