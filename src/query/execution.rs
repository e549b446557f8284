//! Statement execution shared by every terminal operation.
//!
//! A terminal operation takes one [`Lease`] for its whole duration: either
//! the connection of the enclosing transaction, or a connection from the
//! database's source that is released when the lease drops, whatever the
//! outcome.

use std::time::{Duration, Instant};

use crate::backend::{Connection, ExecResult};
use crate::database::Database;
use crate::error::{QuarryError, Result};
use crate::row::Row;
use crate::value::{self, Value};

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Connection held by one terminal operation.
pub(crate) enum Lease<'a> {
    /// Borrowed from a transaction; the transaction decides its fate.
    Bound(&'a dyn Connection),
    /// Opened from the source; released on drop.
    Owned {
        db: &'a Database,
        conn: Option<Box<dyn Connection>>,
    },
}

impl<'a> Lease<'a> {
    pub(crate) fn acquire(db: &'a Database, bound: Option<&'a dyn Connection>) -> Result<Self> {
        match bound {
            Some(conn) => Ok(Lease::Bound(conn)),
            None => Ok(Lease::Owned {
                db,
                conn: Some(db.source().open()?),
            }),
        }
    }

    pub(crate) fn conn(&self) -> Result<&dyn Connection> {
        match self {
            Lease::Bound(conn) => Ok(*conn),
            Lease::Owned { conn, .. } => conn
                .as_deref()
                .ok_or_else(|| QuarryError::Connection("connection already released".into())),
        }
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if let Lease::Owned { db, conn } = self {
            if let Some(conn) = conn.take() {
                db.source().release(conn);
            }
        }
    }
}

/// Run a row-returning statement.
pub(crate) fn fetch(
    db: &Database,
    conn: &dyn Connection,
    sql: &str,
    params: &[Value],
) -> Result<Vec<Row>> {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::execute_query_span(sql).entered();

    let start = Instant::now();
    let result = conn.query(sql, params);
    observe(db, sql, params, start.elapsed(), result.as_ref().err());
    result
}

/// Run a statement that modifies rows.
pub(crate) fn exec(
    db: &Database,
    conn: &dyn Connection,
    sql: &str,
    params: &[Value],
) -> Result<ExecResult> {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::execute_query_span(sql).entered();

    let start = Instant::now();
    let result = conn.execute(sql, params);
    observe(db, sql, params, start.elapsed(), result.as_ref().err());
    result
}

fn observe(db: &Database, sql: &str, params: &[Value], elapsed: Duration, err: Option<&QuarryError>) {
    #[cfg(feature = "metrics")]
    METRICS.record_query(elapsed, err.is_none());

    if let Some(err) = err {
        log::debug!(target: "quarry::sql", "failed after {elapsed:?}: {sql} ({err})");
        return;
    }
    let level = if db.options().enable_sql_statistic {
        log::Level::Info
    } else {
        log::Level::Trace
    };
    if log::log_enabled!(target: "quarry::sql", level) {
        let rendered: Vec<String> = params.iter().map(value::display).collect();
        log::log!(
            target: "quarry::sql",
            level,
            "{sql} | params: [{}] | {elapsed:?}",
            rendered.join(", ")
        );
    }
}
