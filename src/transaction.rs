//! Transactions and atomic blocks.
//!
//! A [`Transaction`] owns one connection from the database's source for its
//! whole life. Queries created from it run on that connection, so every
//! statement issued through the handle belongs to the transaction.
//!
//! [`Database::atomic`] is the usual entry point: it begins a transaction,
//! hands it to a closure, and turns the outcome into an [`Atomic`] value
//! instead of an error:
//!
//! ```no_run
//! use quarry::{Database, Model};
//!
//! #[derive(Debug, Default, Model)]
//! struct Account {
//!     #[primary_key]
//!     id: Option<i64>,
//!     balance: Option<i64>,
//! }
//!
//! # fn run(db: &Database) {
//! let outcome = db.atomic(|tx| {
//!     tx.update::<Account>().set(Account::BALANCE, 90).update_by_id(1)?;
//!     tx.update::<Account>().set(Account::BALANCE, 110).update_by_id(2)?;
//!     Ok(())
//! });
//! if outcome.is_rollback() {
//!     log::warn!("transfer undone: {:?}", outcome.error());
//! }
//! # }
//! ```
//!
//! Whether an error undoes the block is decided by the database's
//! [`RollbackPolicy`]. An error the policy does not match leaves the writes
//! made so far in place: they are committed and the error is still reported.

use std::fmt;
use std::sync::Arc;

use crate::backend::Connection;
use crate::database::Database;
use crate::error::{ErrorKind, QuarryError, Result};
use crate::model::{FromRow, Model};
use crate::query::{DmlIntent, Query, Select};
use crate::result::{ResultKey, ResultList};
use crate::value::Value;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Which errors undo an atomic block.
#[derive(Clone, Default)]
pub enum RollbackPolicy {
    /// Every error rolls back.
    #[default]
    Any,
    /// Only errors of these kinds roll back.
    Kinds(Vec<ErrorKind>),
    Custom(Arc<dyn Fn(&QuarryError) -> bool + Send + Sync>),
}

impl RollbackPolicy {
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&QuarryError) -> bool + Send + Sync + 'static,
    {
        RollbackPolicy::Custom(Arc::new(predicate))
    }

    pub fn should_rollback(&self, err: &QuarryError) -> bool {
        match self {
            RollbackPolicy::Any => true,
            RollbackPolicy::Kinds(kinds) => kinds.contains(&err.kind()),
            RollbackPolicy::Custom(predicate) => predicate(err),
        }
    }
}

impl fmt::Debug for RollbackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackPolicy::Any => f.write_str("Any"),
            RollbackPolicy::Kinds(kinds) => f.debug_tuple("Kinds").field(kinds).finish(),
            RollbackPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Outcome of an atomic block.
#[must_use = "an atomic block reports failure through its outcome"]
#[derive(Debug)]
pub struct Atomic<T = ()> {
    outcome: Result<T>,
    rolled_back: bool,
}

impl<T> Atomic<T> {
    pub(crate) fn ok(value: T) -> Self {
        Self {
            outcome: Ok(value),
            rolled_back: false,
        }
    }

    pub(crate) fn failed(err: QuarryError, rolled_back: bool) -> Self {
        Self {
            outcome: Err(err),
            rolled_back,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Whether the block's writes were undone.
    pub fn is_rollback(&self) -> bool {
        self.rolled_back
    }

    pub fn error(&self) -> Option<&QuarryError> {
        self.outcome.as_ref().err()
    }

    pub fn value(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    /// Run `handler` on the error, if any, and keep the outcome.
    pub fn catch_error<F>(self, handler: F) -> Self
    where
        F: FnOnce(&QuarryError),
    {
        if let Err(err) = &self.outcome {
            handler(err);
        }
        self
    }

    /// The block's value, or the one `recover` derives from the error.
    pub fn catch_and_return<F>(self, recover: F) -> T
    where
        F: FnOnce(QuarryError) -> T,
    {
        self.outcome.unwrap_or_else(recover)
    }

    pub fn into_result(self) -> Result<T> {
        self.outcome
    }
}

/// An open database transaction.
///
/// Finish it with [`Transaction::commit`] or [`Transaction::rollback`]. A
/// transaction dropped while still open (an early return, a panic unwinding
/// through the block) is rolled back. Either way its connection goes back to
/// the source, or is discarded when the backend asks for that or a rollback
/// failed.
pub struct Transaction<'a> {
    db: &'a Database,
    conn: Option<Box<dyn Connection>>,
    finished: bool,
    /// A rollback failed; the connection may still be inside the transaction.
    broken: bool,
}

impl<'a> Transaction<'a> {
    pub(crate) fn begin(db: &'a Database) -> Result<Self> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::begin_transaction_span().entered();

        let conn = db.source().open()?;
        if let Err(err) = conn.begin() {
            db.source().release(conn);
            return Err(err);
        }
        log::debug!("transaction started");
        Ok(Self {
            db,
            conn: Some(conn),
            finished: false,
            broken: false,
        })
    }

    fn connection(&self) -> Option<&dyn Connection> {
        self.conn.as_deref()
    }

    pub fn database(&self) -> &'a Database {
        self.db
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Query on the transaction's connection.
    pub fn query<M: Model>(&self) -> Query<'_, M> {
        Query::new(self.db, self.connection())
    }

    pub fn select(&self, columns: &str) -> Select<'_> {
        Select::new(self.db, self.connection(), columns.to_string())
    }

    /// Query whose [`Query::execute`] runs an UPDATE.
    pub fn update<M: Model>(&self) -> Query<'_, M> {
        self.query().with_intent(DmlIntent::Update)
    }

    /// Query whose [`Query::execute`] runs a DELETE.
    pub fn delete<M: Model>(&self) -> Query<'_, M> {
        self.query().with_intent(DmlIntent::Delete)
    }

    pub fn save<M: Model>(&self, model: &M) -> Result<ResultKey> {
        self.query::<M>().save(model)
    }

    /// Raw statement; returns the affected row count.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        Ok(self.db.exec_on(self.connection(), sql, params)?.rows_affected)
    }

    pub fn execute_and_get_key(&self, sql: &str, params: &[Value]) -> Result<ResultKey> {
        let result = self.db.exec_on(self.connection(), sql, params)?;
        Ok(ResultKey::new(result.last_insert_id))
    }

    pub fn by_sql<T: FromRow>(&self, sql: &str, params: Vec<Value>) -> ResultList<'_, T> {
        ResultList::new(self.db, self.connection(), sql, params)
    }

    /// Nested atomic block.
    ///
    /// Runs `work` inside this transaction: there is no savepoint, and an
    /// error is returned to the enclosing block, which decides whether to
    /// roll back.
    pub fn atomic<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'a>) -> Result<T>,
    {
        work(self)
    }

    pub fn commit(mut self) -> Result<()> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::commit_transaction_span().entered();

        let result = match self.connection() {
            Some(conn) => conn.commit(),
            None => Err(closed()),
        };
        match result {
            Ok(()) => {
                self.finished = true;
                #[cfg(feature = "metrics")]
                METRICS.record_transaction(false);
                log::debug!("transaction committed");
                Ok(())
            }
            // Left unfinished: dropping `self` rolls back.
            Err(err) => {
                log::warn!("commit failed, rolling back: {err}");
                Err(err)
            }
        }
    }

    pub fn rollback(mut self) -> Result<()> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::rollback_transaction_span().entered();

        let result = match self.connection() {
            Some(conn) => conn.rollback(),
            None => Err(closed()),
        };
        self.finished = true;
        self.broken = result.is_err();
        #[cfg(feature = "metrics")]
        METRICS.record_transaction(true);
        log::debug!("transaction rolled back");
        result
    }

    /// Run `work`, then commit or roll back according to the rollback policy.
    pub(crate) fn run<T, F>(self, work: F) -> Atomic<T>
    where
        F: FnOnce(&Transaction<'a>) -> Result<T>,
    {
        match work(&self) {
            Ok(value) => match self.commit() {
                Ok(()) => Atomic::ok(value),
                Err(err) => Atomic::failed(err, true),
            },
            Err(err) if self.db.options().rollback_policy.should_rollback(&err) => {
                log::warn!("atomic block failed, rolling back: {err}");
                if let Err(rollback_err) = self.rollback() {
                    log::warn!("rollback failed: {rollback_err}");
                }
                Atomic::failed(err, true)
            }
            Err(err) => {
                log::warn!("atomic block failed with an error outside the rollback policy, keeping its writes: {err}");
                match self.commit() {
                    Ok(()) => Atomic::failed(err, false),
                    Err(commit_err) => {
                        log::warn!("commit of partial writes failed: {commit_err}");
                        Atomic::failed(err, true)
                    }
                }
            }
        }
    }
}

fn closed() -> QuarryError {
    QuarryError::Connection("transaction has no connection".into())
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if !self.finished {
            #[cfg(feature = "tracing")]
            let _span = tracing_helpers::rollback_transaction_span().entered();

            log::warn!("transaction dropped while open, rolling back");
            if let Err(err) = conn.rollback() {
                log::warn!("rollback on drop failed: {err}");
                self.broken = true;
            }
            #[cfg(feature = "metrics")]
            METRICS.record_transaction(true);
        }
        if self.broken || conn.is_rollback_on_close() {
            self.db.source().discard(conn);
        } else {
            self.db.source().release(conn);
        }
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("finished", &self.finished)
            .field("broken", &self.broken)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ConnectionSource, ExecResult};
    use crate::error::codes;
    use crate::row::Row;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Connection whose ROLLBACK always fails.
    struct StuckConnection;

    impl Connection for StuckConnection {
        fn query(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
            Ok(Vec::new())
        }

        fn execute(&self, _sql: &str, _params: &[Value]) -> Result<ExecResult> {
            Ok(ExecResult {
                rows_affected: 0,
                last_insert_id: None,
            })
        }

        fn begin(&self) -> Result<()> {
            Ok(())
        }

        fn commit(&self) -> Result<()> {
            Ok(())
        }

        fn rollback(&self) -> Result<()> {
            Err(QuarryError::Connection("connection lost".into()))
        }

        fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CountingSource {
        released: Arc<AtomicUsize>,
        discarded: Arc<AtomicUsize>,
    }

    impl ConnectionSource for CountingSource {
        fn open(&self) -> Result<Box<dyn Connection>> {
            Ok(Box::new(StuckConnection))
        }

        fn release(&self, _conn: Box<dyn Connection>) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }

        fn discard(&self, _conn: Box<dyn Connection>) {
            self.discarded.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_db() -> (Database, CountingSource) {
        let source = CountingSource::default();
        let db = Database::builder().source(source.clone()).build().unwrap();
        (db, source)
    }

    #[test]
    fn test_failed_rollback_discards_connection() {
        let (db, source) = counting_db();
        let tx = db.begin().unwrap();
        assert!(tx.rollback().is_err());
        assert_eq!(source.discarded.load(Ordering::SeqCst), 1);
        assert_eq!(source.released.load(Ordering::SeqCst), 0);

        let outcome: Atomic<()> = db.atomic(|_| Err(QuarryError::application("boom")));
        assert!(outcome.is_rollback());
        assert_eq!(source.discarded.load(Ordering::SeqCst), 2);

        drop(db.begin().unwrap());
        assert_eq!(source.discarded.load(Ordering::SeqCst), 3);

        let committed = db.atomic(|_| Ok(1));
        assert!(committed.is_ok());
        assert_eq!(source.released.load(Ordering::SeqCst), 1);
        assert_eq!(source.discarded.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_policy_any_matches_everything() {
        let policy = RollbackPolicy::default();
        assert!(policy.should_rollback(&QuarryError::Execution("x".into())));
        assert!(policy.should_rollback(&QuarryError::application("y")));
    }

    #[test]
    fn test_policy_kinds() {
        let policy = RollbackPolicy::Kinds(vec![ErrorKind::Execution]);
        assert!(policy.should_rollback(&QuarryError::Execution("x".into())));
        assert!(!policy.should_rollback(&QuarryError::application("y")));
        assert!(!policy.should_rollback(&QuarryError::precondition(codes::EMPTY_UPDATE, "z")));
    }

    #[test]
    fn test_policy_custom() {
        let policy = RollbackPolicy::custom(|err| err.code() == codes::APPLICATION);
        assert!(policy.should_rollback(&QuarryError::application("y")));
        assert!(!policy.should_rollback(&QuarryError::Execution("x".into())));
        assert_eq!(format!("{policy:?}"), "Custom(..)");
    }

    #[test]
    fn test_atomic_accessors() {
        let ok = Atomic::ok(3);
        assert!(ok.is_ok());
        assert!(!ok.is_rollback());
        assert_eq!(ok.value(), Some(&3));

        let mut seen = None;
        let failed: Atomic<i32> = Atomic::failed(QuarryError::application("boom"), true)
            .catch_error(|err| seen = Some(err.code()));
        assert_eq!(seen, Some(codes::APPLICATION));
        assert!(failed.is_rollback());
        assert!(failed.error().is_some());
        assert_eq!(failed.catch_and_return(|_| -1), -1);
    }
}
