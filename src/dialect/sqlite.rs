use super::{duplicate_assignments, render_insert, Dialect, SqlParams};

/// SQLite. `LIMIT size OFFSET offset` pagination, `ON CONFLICT(pk) DO UPDATE` upserts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn insert(&self, params: &SqlParams) -> String {
        let sql = render_insert(params);
        if params.non_null_columns().next().is_none() {
            format!("{sql} DEFAULT VALUES")
        } else {
            sql
        }
    }

    fn insert_on_duplicate(&self, params: &SqlParams) -> String {
        upsert(self.insert(params), params)
    }

    fn paginate(&self, params: &SqlParams) -> String {
        let page = params.page_row.unwrap_or_default();
        format!(
            "{} LIMIT {} OFFSET {}",
            self.select(params),
            page.page_size,
            page.offset()
        )
    }
}

/// `ON CONFLICT(pk)` clause shared by SQLite and PostgreSQL.
pub(super) fn upsert(mut sql: String, params: &SqlParams) -> String {
    let assignments = duplicate_assignments(params);
    if assignments.is_empty() {
        sql.push_str(&format!(" ON CONFLICT({}) DO NOTHING", params.pk_column));
    } else {
        sql.push_str(&format!(
            " ON CONFLICT({}) DO UPDATE SET {}",
            params.pk_column,
            assignments.join(", ")
        ));
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::PageRow;
    use crate::value::Value;

    #[test]
    fn test_paginate() {
        let mut p = SqlParams::new("posts", "id");
        p.condition = " AND author_id = ?".into();
        p.page_row = Some(PageRow::new(2, 5));
        assert_eq!(
            SqliteDialect.paginate(&p),
            "SELECT * FROM posts WHERE author_id = ? LIMIT 5 OFFSET 5"
        );
    }

    #[test]
    fn test_upsert() {
        let mut p = SqlParams::new("posts", "id");
        p.column_values = vec![
            ("id".into(), Value::from(1i64)),
            ("title".into(), Value::from("t".to_string())),
        ];
        p.duplicate_columns = vec!["title".into()];
        assert_eq!(
            SqliteDialect.insert_on_duplicate(&p),
            "INSERT INTO posts(id, title) VALUES (?, ?) ON CONFLICT(id) DO UPDATE SET title = ?"
        );
        p.duplicate_columns.clear();
        assert_eq!(
            SqliteDialect.insert_on_duplicate(&p),
            "INSERT INTO posts(id, title) VALUES (?, ?) ON CONFLICT(id) DO NOTHING"
        );
    }

    #[test]
    fn test_all_null_insert_uses_default_values() {
        let mut p = SqlParams::new("posts", "id");
        p.column_values = vec![("id".into(), Value::BigInt(None))];
        assert_eq!(SqliteDialect.insert(&p), "INSERT INTO posts DEFAULT VALUES");
    }
}
