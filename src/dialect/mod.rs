//! SQL rendering.
//!
//! A [`Dialect`] turns the [`SqlParams`] accumulated by a query into statement
//! text with `?` placeholders. Rendering is pure: no I/O and no access to the
//! bound values beyond their null-ness. Only pagination is left to each
//! database product.

mod mysql;
mod postgres;
mod sqlite;

use std::fmt;

use crate::error::{codes, QuarryError, Result};
use crate::result::PageRow;
use crate::value::{self, Value};

pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

/// Intermediate representation of one statement.
#[derive(Debug, Clone, Default)]
pub struct SqlParams {
    pub table: String,
    pub pk_column: String,
    /// Condition buffer: `" AND a = ?"` / `" OR (b = ?)"` fragments, in call order.
    pub condition: String,
    /// Explicit projection set by `select(...)`.
    pub select_columns: Option<String>,
    pub excluded_columns: Vec<String>,
    /// Every persistable column, used to expand exclusions.
    pub all_columns: Vec<String>,
    /// Order buffer: `" a ASC, b DESC"`.
    pub order_by: String,
    /// Append a `LIMIT ?` marker whose value is the last bound parameter.
    pub sql_limit: bool,
    /// Pre-built statement replacing the generated `SELECT ... FROM ... WHERE ...`.
    pub custom_sql: Option<String>,
    pub page_row: Option<PageRow>,
    /// Model columns and values in declaration order, nulls included.
    pub column_values: Vec<(String, Value)>,
    /// Columns flagged update-on-duplicate.
    pub duplicate_columns: Vec<String>,
    /// Columns assigned through `set(...)`, in call order.
    pub update_columns: Vec<String>,
    /// Column left out of model-driven SET lists.
    pub skip_column: Option<String>,
}

impl SqlParams {
    pub fn new(table: impl Into<String>, pk_column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            pk_column: pk_column.into(),
            ..Default::default()
        }
    }

    /// Condition text without the leading connective, empty when there is none.
    pub fn where_clause(&self) -> &str {
        let condition = self.condition.as_str();
        condition
            .strip_prefix(" AND ")
            .or_else(|| condition.strip_prefix(" OR "))
            .unwrap_or(condition)
            .trim_start()
    }

    /// Columns of non-null model values, in declaration order.
    pub fn non_null_columns(&self) -> impl Iterator<Item = &str> {
        self.column_values
            .iter()
            .filter(|(_, v)| !value::is_null(v))
            .map(|(c, _)| c.as_str())
    }

    fn push_where(&self, sql: &mut String) {
        let clause = self.where_clause();
        if !clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(clause);
        }
    }

    fn projection(&self) -> String {
        if let Some(columns) = self.select_columns.as_deref().filter(|c| !c.trim().is_empty()) {
            return columns.trim().to_string();
        }
        if !self.excluded_columns.is_empty() {
            let kept: Vec<&str> = self
                .all_columns
                .iter()
                .filter(|c| {
                    !self
                        .excluded_columns
                        .iter()
                        .any(|x| x.eq_ignore_ascii_case(c))
                })
                .map(String::as_str)
                .collect();
            if !kept.is_empty() {
                return kept.join(", ");
            }
        }
        "*".to_string()
    }
}

/// `INSERT INTO t(a, b) VALUES (?, ?)` over the non-null model columns.
///
/// With every value null the statement degenerates to `INSERT INTO t`.
pub fn render_insert(params: &SqlParams) -> String {
    let mut sql = format!("INSERT INTO {}", params.table);
    let columns: Vec<&str> = params.non_null_columns().collect();
    if !columns.is_empty() {
        let placeholders = vec!["?"; columns.len()].join(", ");
        sql.push_str(&format!("({}) VALUES ({})", columns.join(", "), placeholders));
    }
    sql
}

/// `col = ?` assignments for the update-on-duplicate columns that carry a value.
pub fn duplicate_assignments(params: &SqlParams) -> Vec<String> {
    params
        .non_null_columns()
        .filter(|c| params.duplicate_columns.iter().any(|d| d == c))
        .map(|c| format!("{c} = ?"))
        .collect()
}

/// Pluggable SQL rendering strategy.
pub trait Dialect: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn select(&self, params: &SqlParams) -> String {
        let mut sql = match params.custom_sql.as_deref() {
            Some(custom) if !custom.trim().is_empty() => custom.to_string(),
            _ => {
                let mut sql = format!("SELECT {} FROM {}", params.projection(), params.table);
                params.push_where(&mut sql);
                sql
            }
        };
        if !params.order_by.trim().is_empty() {
            sql.push_str(" ORDER BY");
            sql.push_str(&params.order_by);
        }
        if params.sql_limit {
            sql.push_str(" LIMIT ?");
        }
        sql
    }

    fn count(&self, params: &SqlParams) -> String {
        let mut sql = format!("SELECT COUNT(*) FROM {}", params.table);
        params.push_where(&mut sql);
        sql
    }

    fn insert(&self, params: &SqlParams) -> String {
        render_insert(params)
    }

    fn insert_on_duplicate(&self, params: &SqlParams) -> String {
        let mut sql = self.insert(params);
        let assignments = duplicate_assignments(params);
        if !assignments.is_empty() {
            sql.push_str(" ON DUPLICATE KEY UPDATE ");
            sql.push_str(&assignments.join(", "));
        }
        sql
    }

    /// SET list from `update_columns`, else from the non-null model columns.
    fn update(&self, params: &SqlParams) -> Result<String> {
        let assignments: Vec<String> = if !params.update_columns.is_empty() {
            params
                .update_columns
                .iter()
                .map(|c| format!("{c} = ?"))
                .collect()
        } else {
            params
                .non_null_columns()
                .filter(|c| params.skip_column.as_deref() != Some(*c))
                .map(|c| format!("{c} = ?"))
                .collect()
        };
        if assignments.is_empty() {
            return Err(QuarryError::precondition(
                codes::EMPTY_UPDATE,
                format!("UPDATE {} has nothing to assign", params.table),
            ));
        }
        let mut sql = format!("UPDATE {} SET {}", params.table, assignments.join(", "));
        params.push_where(&mut sql);
        Ok(sql)
    }

    /// Condition buffer, else an `and`-joined equality over non-null model columns.
    fn delete(&self, params: &SqlParams) -> Result<String> {
        let mut sql = format!("DELETE FROM {}", params.table);
        if !params.where_clause().is_empty() {
            params.push_where(&mut sql);
            return Ok(sql);
        }
        let equalities: Vec<String> = params
            .non_null_columns()
            .map(|c| format!("{c} = ?"))
            .collect();
        if equalities.is_empty() {
            return Err(QuarryError::precondition(
                codes::UNSAFE_DELETE,
                format!(
                    "DELETE FROM {} needs a condition or a populated model",
                    params.table
                ),
            ));
        }
        sql.push_str(" WHERE ");
        sql.push_str(&equalities.join(" and "));
        Ok(sql)
    }

    /// Page of the select rendered from `params`; `params.page_row` must be set.
    fn paginate(&self, params: &SqlParams) -> String;
}

/// Dialect matching a connection URL: Postgres and SQLite by scheme, MySQL otherwise.
pub fn for_url(url: &str) -> Box<dyn Dialect> {
    let lower = url.trim().to_ascii_lowercase();
    if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
        Box::new(PostgresDialect)
    } else if lower.starts_with("sqlite:") || lower.ends_with(".db") || lower.ends_with(".sqlite")
    {
        Box::new(SqliteDialect)
    } else {
        Box::new(MySqlDialect)
    }
}

/// Dialect by name, as written in configuration.
pub fn by_name(name: &str) -> Option<Box<dyn Dialect>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "mysql" | "mariadb" => Some(Box::new(MySqlDialect)),
        "sqlite" | "sqlite3" => Some(Box::new(SqliteDialect)),
        "postgres" | "postgresql" | "pg" => Some(Box::new(PostgresDialect)),
        _ => None,
    }
}
