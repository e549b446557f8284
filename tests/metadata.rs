//! Table naming, column mapping and memoization of model metadata.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{harness, harness_with, Category};
use quarry::error::codes;
use quarry::{Col, MetadataCache, Model};

#[derive(Debug, Default, Model)]
struct Bus {
    id: Option<i64>,
    plate_number: Option<String>,
}

#[derive(Debug, Default, Model)]
struct City {
    #[primary_key]
    city_code: Option<String>,
    name: Option<String>,
    #[skip]
    visits: u32,
}

#[derive(Debug, Default, Model)]
#[table_name = "legacy_people"]
struct Person {
    #[primary_key]
    #[column_name = "person_no"]
    number: Option<i64>,
}

#[test]
fn test_table_names_are_pluralized() {
    let cache = MetadataCache::default();
    assert_eq!(cache.table_name::<Category>(), "categories");
    assert_eq!(cache.table_name::<Bus>(), "buses");
    assert_eq!(cache.table_name::<City>(), "cities");
    assert_eq!(cache.table_name::<Person>(), "legacy_people");
}

#[test]
fn test_table_prefix() {
    let h = harness_with(|b| b.table_prefix("t_"));
    assert_eq!(h.db.metadata().table_name::<Category>(), "t_categories");
    assert_eq!(h.db.query::<Category>().table(), "t_categories");
}

#[test]
fn test_metadata_is_memoized() {
    let cache = MetadataCache::default();
    let first = cache.meta::<Category>();
    let second = cache.meta::<Category>();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
    cache.meta::<Bus>();
    assert_eq!(cache.len(), 2);
}

#[derive(Debug, Default, Model)]
struct Warehouse {
    #[primary_key]
    #[column_name = "site_code"]
    code: Option<String>,
    capacity: Option<i64>,
}

#[test]
fn test_concurrent_first_access_converges() {
    const THREADS: usize = 8;
    let cache = MetadataCache::new("t".to_string());
    let barrier = Barrier::new(THREADS);

    let metas: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    cache.meta::<Warehouse>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(cache.len(), 1);
    let stored = cache.meta::<Warehouse>();
    for meta in &metas {
        assert!(Arc::ptr_eq(meta, &stored));
        assert_eq!(meta.table(), "t_warehouses");
        assert_eq!(meta.primary_key_column(), "site_code");
    }
}

#[test]
fn test_primary_keys() {
    let cache = MetadataCache::default();
    assert_eq!(cache.primary_key_column::<Bus>(), "id");
    assert_eq!(cache.primary_key_column::<City>(), "city_code");
    assert_eq!(cache.primary_key_column::<Person>(), "person_no");
    assert_eq!(cache.primary_key_field::<Person>(), "number");
}

#[test]
fn test_persistable_fields_in_declaration_order() {
    let cache = MetadataCache::default();
    let columns: Vec<String> = cache
        .persistable_fields::<Category>()
        .into_iter()
        .map(|f| f.column)
        .collect();
    assert_eq!(columns, ["id", "name", "descr", "created_at"]);

    let city: Vec<&str> = cache
        .persistable_fields::<City>()
        .iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(city, ["city_code", "name"]);
    assert!(cache.update_on_duplicate::<Category>("name"));
    assert!(!cache.update_on_duplicate::<Category>("description"));
}

#[test]
fn test_column_accessors() {
    let cache = MetadataCache::default();
    assert_eq!(cache.resolve::<Category>(Category::DESCRIPTION.field()).unwrap(), "descr");
    assert_eq!(cache.resolve::<Bus>(Bus::PLATE_NUMBER.field()).unwrap(), "plate_number");

    let err = cache.resolve::<Category>("title").unwrap_err();
    assert_eq!(err.code(), codes::UNKNOWN_COLUMN);
}

#[test]
fn test_unknown_accessor_fails_the_terminal_call() {
    let h = harness();
    h.log.clear();
    let err = h
        .db
        .query::<Category>()
        .where_eq(Col::<Category>::new("title"), "x")
        .all()
        .unwrap_err();
    assert_eq!(err.code(), codes::UNKNOWN_COLUMN);
    assert_eq!(h.log.len(), 0);
}
