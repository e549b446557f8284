use super::sqlite::upsert;
use super::{render_insert, Dialect, SqlParams};

/// PostgreSQL. Same pagination and upsert syntax as SQLite; inserts return the
/// primary key so the generated key can be read back.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn insert(&self, params: &SqlParams) -> String {
        let mut sql = render_insert(params);
        if params.non_null_columns().next().is_none() {
            sql.push_str(" DEFAULT VALUES");
        }
        returning(sql, params)
    }

    fn insert_on_duplicate(&self, params: &SqlParams) -> String {
        let mut sql = render_insert(params);
        if params.non_null_columns().next().is_none() {
            sql.push_str(" DEFAULT VALUES");
        }
        returning(upsert(sql, params), params)
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

fn returning(sql: String, params: &SqlParams) -> String {
    if params.pk_column.is_empty() {
        sql
    } else {
        format!("{sql} RETURNING {}", params.pk_column)
    }
}
