//! SQLite backend over `rusqlite`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::{Value as SqliteValue, ValueRef};

use crate::backend::{is_insert, Connection, ExecResult};
use crate::error::{QuarryError, Result};
use crate::pool::ConnectionPool;
use crate::row::Row;
use crate::value::{self, Value};

/// Database a SQLite URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteTarget {
    /// Private in-memory database. Lives as long as its single connection.
    Memory,
    File(PathBuf),
}

impl SqliteTarget {
    /// Accepts `sqlite::memory:`, `:memory:`, `sqlite://path`, `sqlite:path` and bare paths.
    pub fn parse(url: &str) -> Self {
        let rest = url.trim();
        let rest = rest
            .strip_prefix("sqlite://")
            .or_else(|| rest.strip_prefix("sqlite:"))
            .unwrap_or(rest);
        match rest {
            "" | ":memory:" | "memory:" => SqliteTarget::Memory,
            path => SqliteTarget::File(PathBuf::from(path)),
        }
    }
}

pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    pub fn open(target: &SqliteTarget, busy_timeout: Duration) -> Result<Self> {
        let conn = match target {
            SqliteTarget::Memory => rusqlite::Connection::open_in_memory()?,
            SqliteTarget::File(path) => rusqlite::Connection::open(path)?,
        };
        conn.busy_timeout(busy_timeout)?;
        Ok(Self { conn })
    }

    /// Underlying driver handle, for schema setup and driver-specific calls.
    pub fn raw(&self) -> &rusqlite::Connection {
        &self.conn
    }

    fn bind(params: &[Value]) -> Result<Vec<SqliteValue>> {
        params.iter().map(to_sqlite).collect()
    }
}

impl Connection for SqliteConnection {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let bound = Self::bind(params)?;
        let mut stmt = self.conn.prepare_cached(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(rusqlite::params_from_iter(bound.iter()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..columns.len())
                .map(|i| row.get_ref(i).map(from_sqlite))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            out.push(Row::new(columns.clone(), values));
        }
        Ok(out)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let bound = Self::bind(params)?;
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows_affected = stmt.execute(rusqlite::params_from_iter(bound.iter()))? as u64;
        let last_insert_id = (rows_affected > 0 && is_insert(sql))
            .then(|| Value::from(self.conn.last_insert_rowid()));
        Ok(ExecResult {
            rows_affected,
            last_insert_id,
        })
    }

    fn begin(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().map_err(|(_, err)| QuarryError::from(err))
    }
}

fn to_sqlite(value: &Value) -> Result<SqliteValue> {
    if value::is_null(value) {
        return Ok(SqliteValue::Null);
    }
    let converted = match value {
        Value::Bool(Some(b)) => SqliteValue::Integer(i64::from(*b)),
        Value::Float(Some(f)) => SqliteValue::Real(f64::from(*f)),
        Value::Double(Some(d)) => SqliteValue::Real(*d),
        Value::String(Some(s)) => SqliteValue::Text(s.to_string()),
        Value::Char(Some(c)) => SqliteValue::Text(c.to_string()),
        Value::Bytes(Some(b)) => SqliteValue::Blob(b.to_vec()),
        Value::Json(Some(j)) => SqliteValue::Text(j.to_string()),
        other => {
            let wide = value::as_integer(other).ok_or_else(|| {
                QuarryError::Execution(format!("unsupported SQLite parameter: {other:?}"))
            })?;
            let narrow = i64::try_from(wide).map_err(|_| {
                QuarryError::Execution(format!("{wide} does not fit a SQLite integer"))
            })?;
            SqliteValue::Integer(narrow)
        }
    };
    Ok(converted)
}

fn from_sqlite(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => value::null(),
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(r) => Value::from(r),
        ValueRef::Text(bytes) => Value::from(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::from(bytes.to_vec()),
    }
}

/// Pool of SQLite connections.
///
/// A private in-memory database exists only inside its connection, so it is
/// served by a pool of exactly one connection. Inside an atomic block on such
/// a database, issue statements through the [`Transaction`](crate::Transaction)
/// handle: the pooled connection is busy until the block ends.
pub fn pool(target: SqliteTarget, max_size: usize, timeout: Duration) -> ConnectionPool {
    let max_size = match target {
        SqliteTarget::Memory => 1,
        SqliteTarget::File(_) => max_size,
    };
    let name = match &target {
        SqliteTarget::Memory => "sqlite::memory:".to_string(),
        SqliteTarget::File(path) => format!("sqlite:{}", path.display()),
    };
    ConnectionPool::new(name, max_size, timeout, move || {
        let conn = SqliteConnection::open(&target, timeout)?;
        Ok(Box::new(conn) as Box<dyn Connection>)
    })
}

/// Pool over a database file.
pub fn file_pool(path: impl AsRef<Path>, max_size: usize, timeout: Duration) -> ConnectionPool {
    pool(
        SqliteTarget::File(path.as_ref().to_path_buf()),
        max_size,
        timeout,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> SqliteConnection {
        SqliteConnection::open(&SqliteTarget::Memory, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(SqliteTarget::parse("sqlite::memory:"), SqliteTarget::Memory);
        assert_eq!(SqliteTarget::parse(":memory:"), SqliteTarget::Memory);
        assert_eq!(
            SqliteTarget::parse("sqlite://data/app.db"),
            SqliteTarget::File(PathBuf::from("data/app.db"))
        );
        assert_eq!(
            SqliteTarget::parse("app.db"),
            SqliteTarget::File(PathBuf::from("app.db"))
        );
    }

    #[test]
    fn test_execute_and_query() {
        let conn = memory();
        conn.raw()
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, score REAL)")
            .unwrap();
        let res = conn
            .execute(
                "INSERT INTO t(name, score) VALUES (?, ?)",
                &[Value::from("a".to_string()), Value::from(1.5f64)],
            )
            .unwrap();
        assert_eq!(res.rows_affected, 1);
        assert_eq!(res.last_insert_id, Some(Value::from(1i64)));

        let rows = conn
            .query("SELECT id, name, score FROM t WHERE name = ?", &[Value::from("a".to_string())])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::from("a".to_string())));
        assert_eq!(rows[0].get("score"), Some(&Value::from(1.5f64)));
    }

    #[test]
    fn test_null_and_bool_binding() {
        let conn = memory();
        conn.raw()
            .execute_batch("CREATE TABLE f (flag INTEGER, note TEXT)")
            .unwrap();
        conn.execute(
            "INSERT INTO f(flag, note) VALUES (?, ?)",
            &[Value::from(true), value::null()],
        )
        .unwrap();
        let rows = conn.query("SELECT flag, note FROM f", &[]).unwrap();
        assert_eq!(rows[0].get("flag"), Some(&Value::from(1i64)));
        assert!(value::is_null(rows[0].get("note").unwrap()));
    }

    #[test]
    fn test_transaction_rollback() {
        let conn = memory();
        conn.raw().execute_batch("CREATE TABLE r (v INTEGER)").unwrap();
        conn.begin().unwrap();
        conn.execute("INSERT INTO r(v) VALUES (?)", &[Value::from(1i64)])
            .unwrap();
        conn.rollback().unwrap();
        let rows = conn.query("SELECT COUNT(*) FROM r", &[]).unwrap();
        assert_eq!(rows[0].get_index(0), Some(&Value::from(0i64)));
    }
}
