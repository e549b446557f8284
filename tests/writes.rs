//! Inserts, updates and deletes.

mod common;

use common::{harness, seed_categories, Category};
use quarry::dialect::{Dialect, MySqlDialect, PostgresDialect, SqlParams};
use quarry::error::codes;
use quarry::{params, value};

fn all_null_params() -> SqlParams {
    let mut params = SqlParams::new("categories", "id");
    params.column_values = vec![
        ("id".to_string(), value::null()),
        ("name".to_string(), value::null()),
        ("descr".to_string(), value::null()),
    ];
    params
}

#[test]
fn test_all_null_insert_renders_table_only() {
    assert_eq!(MySqlDialect.insert(&all_null_params()), "INSERT INTO categories");
    assert_eq!(
        PostgresDialect.insert(&all_null_params()),
        "INSERT INTO categories DEFAULT VALUES RETURNING id"
    );
}

#[test]
fn test_all_null_save_on_sqlite() {
    let h = harness();
    let key = h.db.save(&Category::default()).unwrap();
    assert_eq!(key.as_long().unwrap(), 1);
    assert_eq!(
        h.log.last().unwrap(),
        "INSERT INTO categories DEFAULT VALUES"
    );
}

#[test]
fn test_save_binds_only_non_null_fields() {
    let h = harness();
    let key = h
        .db
        .save(&Category {
            name: Some("n".into()),
            created_at: Some("2024-01-01".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(key.as_int().unwrap(), 1);
    assert_eq!(key.as_string().unwrap(), "1");
    assert_eq!(
        h.log.last().unwrap(),
        "INSERT INTO categories(name, created_at) VALUES (?, ?)"
    );
}

#[test]
fn test_save_or_update_on_duplicate() {
    let h = harness();
    seed_categories(&h.db, 2);
    let changed = Category {
        id: Some(1),
        name: Some("renamed".into()),
        description: Some("kept out of the update".into()),
        ..Default::default()
    };
    let key = h
        .db
        .query::<Category>()
        .save_or_update_on_duplicate(&changed)
        .unwrap();
    assert_eq!(key.as_long().unwrap(), 1);
    assert_eq!(
        h.log.last().unwrap(),
        "INSERT INTO categories(id, name, descr) VALUES (?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET name = ?"
    );
    let row = h.db.query::<Category>().by_id(1).unwrap().unwrap();
    assert_eq!(row.name.as_deref(), Some("renamed"));
    assert_eq!(row.description, None);
    assert_eq!(h.db.query::<Category>().count().unwrap(), 2);
}

#[test]
fn test_save_or_update_on_duplicate_returns_generated_key_for_new_rows() {
    let h = harness();
    seed_categories(&h.db, 2);
    let key = h
        .db
        .query::<Category>()
        .save_or_update_on_duplicate(&Category::named("fresh"))
        .unwrap();
    assert_eq!(key.as_long().unwrap(), 3);
    assert_eq!(h.db.query::<Category>().count().unwrap(), 3);
}

#[test]
fn test_update_with_assignments() {
    let h = harness();
    seed_categories(&h.db, 3);
    h.log.clear();
    let updated = h
        .db
        .query::<Category>()
        .set(Category::DESCRIPTION, "first")
        .set(Category::NAME, "x")
        .set(Category::DESCRIPTION, "second")
        .gt(Category::ID, 1)
        .update()
        .unwrap();
    assert_eq!(updated, 2);
    assert_eq!(
        h.log.last().unwrap(),
        "UPDATE categories SET descr = ?, name = ? WHERE id > ?"
    );
    let row = h.db.query::<Category>().by_id(3).unwrap().unwrap();
    assert_eq!(row.description.as_deref(), Some("second"));
}

#[test]
fn test_update_without_assignments_is_rejected() {
    let h = harness();
    h.log.clear();
    let err = h
        .db
        .query::<Category>()
        .where_eq(Category::ID, 1)
        .update()
        .unwrap_err();
    assert_eq!(err.code(), codes::EMPTY_UPDATE);
    assert_eq!(h.log.len(), 0);
}

#[test]
fn test_update_by_model_without_key_updates_every_row() {
    let h = harness();
    seed_categories(&h.db, 3);
    h.log.clear();
    let affected = h
        .db
        .query::<Category>()
        .update_by_model(&Category {
            description: Some("everywhere".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(affected, 3);
    assert_eq!(h.log.last().unwrap(), "UPDATE categories SET descr = ?");
    assert_eq!(
        h.db.query::<Category>()
            .where_eq(Category::DESCRIPTION, "everywhere")
            .count()
            .unwrap(),
        3
    );
}

#[test]
fn test_update_by_model_with_key() {
    let h = harness();
    seed_categories(&h.db, 3);
    let affected = h
        .db
        .query::<Category>()
        .update_by_model(&Category {
            id: Some(2),
            name: Some("two".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(affected, 1);
    assert_eq!(
        h.log.last().unwrap(),
        "UPDATE categories SET name = ? WHERE id = ?"
    );

    // Accumulated conditions come before the key.
    let affected = h
        .db
        .query::<Category>()
        .where_eq(Category::NAME, "c3")
        .update_by_model(&Category {
            id: Some(2),
            description: Some("never".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(affected, 0);
    assert_eq!(
        h.log.last().unwrap(),
        "UPDATE categories SET descr = ? WHERE name = ? AND id = ?"
    );
}

#[test]
fn test_update_model_by_id() {
    let h = harness();
    seed_categories(&h.db, 2);
    let affected = h
        .db
        .query::<Category>()
        .update_model_by_id(
            &Category {
                id: Some(99),
                name: Some("moved".into()),
                ..Default::default()
            },
            1,
        )
        .unwrap();
    assert_eq!(affected, 1);
    assert_eq!(
        h.log.last().unwrap(),
        "UPDATE categories SET name = ? WHERE id = ?"
    );
    let row = h.db.query::<Category>().by_id(1).unwrap().unwrap();
    assert_eq!(row.name.as_deref(), Some("moved"));
}

#[test]
fn test_deletes() {
    let h = harness();
    seed_categories(&h.db, 5);

    assert_eq!(h.db.delete_by_id::<Category>(1).unwrap(), 1);
    assert_eq!(
        h.db.query::<Category>().delete_by_model(&Category::named("c2")).unwrap(),
        1
    );
    assert_eq!(h.log.last().unwrap(), "DELETE FROM categories WHERE name = ?");

    // The condition wins over the model.
    assert_eq!(
        h.db.query::<Category>()
            .where_eq(Category::ID, 3)
            .delete_by_model(&Category::named("c4"))
            .unwrap(),
        1
    );
    assert_eq!(h.log.last().unwrap(), "DELETE FROM categories WHERE id = ?");

    let err = h.db.query::<Category>().delete().unwrap_err();
    assert_eq!(err.code(), codes::UNSAFE_DELETE);

    let remaining = h.db.query::<Category>().all().unwrap();
    let names: Vec<_> = remaining.iter().filter_map(|c| c.name.as_deref()).collect();
    assert_eq!(names, ["c4", "c5"]);
}

#[test]
fn test_execute_dispatches_on_intent() {
    let h = harness();
    seed_categories(&h.db, 3);

    let updated = h
        .db
        .update::<Category>()
        .set(Category::NAME, "z")
        .where_eq(Category::ID, 1)
        .execute()
        .unwrap();
    assert_eq!(updated, 1);

    let deleted = h
        .db
        .delete::<Category>()
        .where_eq(Category::NAME, "z")
        .execute()
        .unwrap();
    assert_eq!(deleted, 1);

    h.log.clear();
    let mut plain = h.db.query::<Category>().where_eq(Category::ID, 2);
    let err = plain.execute().unwrap_err();
    assert_eq!(err.code(), codes::MODEL_NOT_BOUND);
    assert!(plain.condition().is_empty());
    assert_eq!(h.log.len(), 0);
}

#[test]
fn test_raw_statements() {
    let h = harness();
    let key = h
        .db
        .execute_and_get_key("INSERT INTO categories(name) VALUES (?)", &params!["raw"])
        .unwrap();
    assert_eq!(key.as_long().unwrap(), 1);
    let changed = h
        .db
        .execute("UPDATE categories SET descr = ? WHERE id = ?", &params!["d", 1])
        .unwrap();
    assert_eq!(changed, 1);
    let no_key = h
        .db
        .execute_and_get_key("DELETE FROM categories", &[])
        .unwrap();
    assert!(!no_key.is_present());
}

#[test]
fn test_batch_facades() {
    let h = harness();
    h.log.clear();
    let saved = h.db.save_batch(&[
        Category::named("a"),
        Category::named("b"),
        Category::named("c"),
    ]);
    assert!(saved.is_ok());
    let keys: Vec<i64> = saved
        .into_result()
        .unwrap()
        .iter()
        .map(|k| k.as_long().unwrap())
        .collect();
    assert_eq!(keys, [1, 2, 3]);
    let log = h.log.all();
    assert_eq!(log.first().map(String::as_str), Some("BEGIN"));
    assert_eq!(log.last().map(String::as_str), Some("COMMIT"));

    let deleted = h.db.delete_batch::<Category, _, _>([1i64, 3]);
    assert_eq!(deleted.value(), Some(&2));
    assert_eq!(h.db.query::<Category>().count().unwrap(), 1);
}
