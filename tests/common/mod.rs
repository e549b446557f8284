//! Shared fixtures: models, schema, and a single-connection source that
//! records every statement reaching the driver.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use quarry::backend::sqlite::{SqliteConnection, SqliteTarget};
use quarry::backend::{Connection, ConnectionSource, ExecResult};
use quarry::dialect::SqliteDialect;
use quarry::{Database, DatabaseBuilder, Model, QuarryError, Result, Row, Value};

// ============================================================================
// Models
// ============================================================================

#[derive(Debug, Default, Clone, PartialEq, Model)]
pub struct Category {
    #[primary_key]
    pub id: Option<i64>,
    #[update_on_duplicate]
    pub name: Option<String>,
    #[column_name = "descr"]
    pub description: Option<String>,
    pub created_at: Option<String>,
}

impl Category {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Model)]
pub struct Author {
    #[primary_key]
    pub id: Option<i64>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Model)]
pub struct Comment {
    #[primary_key]
    pub id: Option<i64>,
    pub article_id: Option<i64>,
    pub body: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Model)]
pub struct Article {
    #[primary_key]
    pub id: Option<i64>,
    pub author_id: Option<i64>,
    pub title: Option<String>,
    #[join]
    pub author: Option<Author>,
    #[join]
    pub comments: Vec<Comment>,
}

pub const SCHEMA: &str = "
    CREATE TABLE categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT,
        descr TEXT,
        created_at TEXT
    );
    CREATE TABLE authors (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT);
    CREATE TABLE articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        author_id INTEGER,
        title TEXT
    );
    CREATE TABLE comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        article_id INTEGER,
        body TEXT
    );
";

// ============================================================================
// Recording source
// ============================================================================

/// Statements seen by the driver, in execution order.
#[derive(Clone, Default)]
pub struct StatementLog(Arc<Mutex<Vec<String>>>);

impl StatementLog {
    pub fn all(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn last(&self) -> Option<String> {
        self.0.lock().last().cloned()
    }

    fn push(&self, sql: &str) {
        self.0.lock().push(sql.to_string());
    }
}

struct RecordingConnection {
    inner: SqliteConnection,
    log: StatementLog,
}

impl Connection for RecordingConnection {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.log.push(sql);
        self.inner.query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        self.log.push(sql);
        self.inner.execute(sql, params)
    }

    fn begin(&self) -> Result<()> {
        self.log.push("BEGIN");
        self.inner.begin()
    }

    fn commit(&self) -> Result<()> {
        self.log.push("COMMIT");
        self.inner.commit()
    }

    fn rollback(&self) -> Result<()> {
        self.log.push("ROLLBACK");
        self.inner.rollback()
    }

    fn close(self: Box<Self>) -> Result<()> {
        Box::new(self.inner).close()
    }
}

/// One in-memory connection, lent out to a single holder at a time.
pub struct RecordingSource {
    slot: Mutex<Option<Box<dyn Connection>>>,
}

impl ConnectionSource for RecordingSource {
    fn open(&self) -> Result<Box<dyn Connection>> {
        self.slot
            .lock()
            .take()
            .ok_or_else(|| QuarryError::Connection("the test connection is in use".into()))
    }

    fn release(&self, conn: Box<dyn Connection>) {
        *self.slot.lock() = Some(conn);
    }
}

pub struct Harness {
    pub db: Database,
    pub log: StatementLog,
}

pub fn harness() -> Harness {
    harness_with(|builder| builder)
}

pub fn harness_with(configure: impl FnOnce(DatabaseBuilder) -> DatabaseBuilder) -> Harness {
    let inner = SqliteConnection::open(&SqliteTarget::Memory, Duration::from_secs(1)).unwrap();
    inner.raw().execute_batch(SCHEMA).unwrap();
    let log = StatementLog::default();
    let conn = RecordingConnection {
        inner,
        log: log.clone(),
    };
    let source = RecordingSource {
        slot: Mutex::new(Some(Box::new(conn))),
    };
    let db = configure(Database::builder().source(source).dialect(SqliteDialect))
        .build()
        .unwrap();
    Harness { db, log }
}

/// Insert `n` categories named `c1..cn`.
pub fn seed_categories(db: &Database, n: usize) {
    for i in 1..=n {
        db.save(&Category::named(&format!("c{i}"))).unwrap();
    }
}
