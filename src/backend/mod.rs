//! Connection and statement primitives.
//!
//! The query core only needs a parameterized statement primitive with
//! transaction control. [`Connection`] is that primitive; a
//! [`ConnectionSource`] hands connections out and takes them back.
//! Statements use `?` placeholders; drivers with another convention translate
//! them (see [`crate::translation`]).

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// Outcome of a data-modifying statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Key generated by an INSERT, when the driver reports one.
    pub last_insert_id: Option<Value>,
}

/// A single database session.
pub trait Connection: Send {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult>;

    fn begin(&self) -> Result<()>;

    fn commit(&self) -> Result<()>;

    fn rollback(&self) -> Result<()>;

    /// Whether the session must be closed instead of reused once a transaction ends.
    fn is_rollback_on_close(&self) -> bool {
        false
    }

    fn close(self: Box<Self>) -> Result<()>;
}

/// Where connections come from and go back to.
pub trait ConnectionSource: Send + Sync {
    fn open(&self) -> Result<Box<dyn Connection>>;

    /// Return a healthy connection for reuse.
    fn release(&self, conn: Box<dyn Connection>);

    /// Close a connection that must not be reused.
    fn discard(&self, conn: Box<dyn Connection>) {
        if let Err(err) = conn.close() {
            log::warn!("error while closing connection: {err}");
        }
    }
}

/// Statement kind, used by drivers that report generated keys only for inserts.
pub(crate) fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("insert"))
}
