//! The database handle.
//!
//! A [`Database`] bundles a connection source, a SQL dialect, the metadata
//! cache and the runtime [`Options`]. Build one at startup and pass it by
//! reference, or install it once as the process-wide handle with
//! [`install`] and fetch it anywhere with [`database`].

use std::fmt;
use std::time::Duration;

use once_cell::sync::OnceCell;

use crate::backend::{Connection, ConnectionSource, ExecResult};
use crate::config::QuarryConfig;
use crate::dialect::{self, Dialect, MySqlDialect};
use crate::error::{codes, QuarryError, Result};
use crate::metadata::MetadataCache;
use crate::model::{FromRow, Model};
use crate::query::execution::{self, Lease};
use crate::query::{DmlIntent, Query, Select};
use crate::result::{ResultKey, ResultList};
use crate::transaction::{Atomic, RollbackPolicy, Transaction};
use crate::value::{IntoValue, Value};

/// Runtime behaviour shared by every query on a [`Database`].
#[derive(Debug, Clone)]
pub struct Options {
    pub table_prefix: String,
    /// Render `LIMIT` in SQL; when off, rows are fetched and truncated.
    pub use_sql_limit: bool,
    /// Log statements at `info` instead of `trace`.
    pub enable_sql_statistic: bool,
    pub rollback_policy: RollbackPolicy,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            use_sql_limit: true,
            enable_sql_statistic: true,
            rollback_policy: RollbackPolicy::Any,
        }
    }
}

pub struct Database {
    source: Box<dyn ConnectionSource>,
    dialect: Box<dyn Dialect>,
    cache: MetadataCache,
    options: Options,
}

/// Builder for [`Database`]. Only the connection source is required; the
/// dialect defaults to MySQL-style `LIMIT offset,size` pagination.
#[derive(Default)]
pub struct DatabaseBuilder {
    source: Option<Box<dyn ConnectionSource>>,
    dialect: Option<Box<dyn Dialect>>,
    options: Options,
}

impl DatabaseBuilder {
    pub fn source<S: ConnectionSource + 'static>(mut self, source: S) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn boxed_source(mut self, source: Box<dyn ConnectionSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn dialect<D: Dialect + 'static>(mut self, dialect: D) -> Self {
        self.dialect = Some(Box::new(dialect));
        self
    }

    pub fn boxed_dialect(mut self, dialect: Box<dyn Dialect>) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.table_prefix = prefix.into();
        self
    }

    pub fn use_sql_limit(mut self, enabled: bool) -> Self {
        self.options.use_sql_limit = enabled;
        self
    }

    pub fn enable_sql_statistic(mut self, enabled: bool) -> Self {
        self.options.enable_sql_statistic = enabled;
        self
    }

    pub fn rollback_policy(mut self, policy: RollbackPolicy) -> Self {
        self.options.rollback_policy = policy;
        self
    }

    pub fn build(self) -> Result<Database> {
        let source = self.source.ok_or_else(|| {
            QuarryError::configuration(
                codes::BAD_CONFIGURATION,
                "a database needs a connection source",
            )
        })?;
        let dialect = self.dialect.unwrap_or_else(|| Box::new(MySqlDialect));
        log::debug!(
            "database ready: dialect={} prefix={:?} sql_limit={}",
            dialect.name(),
            self.options.table_prefix,
            self.options.use_sql_limit
        );
        Ok(Database {
            source,
            dialect,
            cache: MetadataCache::new(self.options.table_prefix.clone()),
            options: self.options,
        })
    }
}

/// `url` with `user` and `password` as its userinfo, replacing any already
/// present. URLs without an authority (`sqlite:`, file paths) come back as-is.
pub fn with_credentials(url: &str, user: Option<&str>, password: Option<&str>) -> String {
    let Some(user) = user else {
        return url.to_string();
    };
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let host = match rest.find('/') {
        Some(slash) => match rest[..slash].rfind('@') {
            Some(at) => &rest[at + 1..],
            None => rest,
        },
        None => rest.rsplit_once('@').map_or(rest, |(_, host)| host),
    };
    let userinfo = match password {
        Some(password) => format!("{}:{}", encode_userinfo(user), encode_userinfo(password)),
        None => encode_userinfo(user),
    };
    format!("{scheme}://{userinfo}@{host}")
}

fn encode_userinfo(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        match c {
            ':' | '@' | '/' | '?' | '#' | '%' | ' ' => out.push_str(&format!("%{:02X}", c as u32)),
            _ => out.push(c),
        }
    }
    out
}

/// Pooled connection source for `url`, by scheme.
fn open_source(url: &str, max_size: usize, timeout: Duration) -> Result<Box<dyn ConnectionSource>> {
    let lower = url.trim().to_ascii_lowercase();

    #[cfg(feature = "postgres")]
    if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
        return Ok(Box::new(crate::backend::postgres::pool(url, max_size, timeout)?));
    }

    #[cfg(feature = "sqlite")]
    if lower.starts_with("sqlite:")
        || lower == ":memory:"
        || lower.ends_with(".db")
        || lower.ends_with(".sqlite")
    {
        let target = crate::backend::sqlite::SqliteTarget::parse(url);
        return Ok(Box::new(crate::backend::sqlite::pool(target, max_size, timeout)));
    }

    Err(QuarryError::configuration(
        codes::BAD_CONFIGURATION,
        format!("no backend enabled for `{lower}`"),
    ))
}

impl Database {
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::default()
    }

    /// Open `url` with default settings.
    pub fn open(url: &str) -> Result<Self> {
        Self::from_config(&QuarryConfig {
            url: url.to_string(),
            ..QuarryConfig::default()
        })
    }

    /// Open `url` as `user`, with default settings. SQLite ignores credentials.
    pub fn open_with(url: &str, user: &str, password: &str) -> Result<Self> {
        Self::from_config(&QuarryConfig {
            url: url.to_string(),
            user: Some(user.to_string()),
            password: Some(password.to_string()),
            ..QuarryConfig::default()
        })
    }

    pub fn from_config(config: &QuarryConfig) -> Result<Self> {
        let dialect = match config.dialect.as_deref() {
            Some(name) => dialect::by_name(name).ok_or_else(|| {
                QuarryError::configuration(
                    codes::BAD_CONFIGURATION,
                    format!("unknown dialect `{name}`"),
                )
            })?,
            None => dialect::for_url(&config.url),
        };
        let url = with_credentials(
            &config.url,
            config.user.as_deref(),
            config.password.as_deref(),
        );
        let source = open_source(&url, config.max_connections, config.pool_timeout())?;
        Self::builder()
            .boxed_source(source)
            .boxed_dialect(dialect)
            .table_prefix(config.table_prefix.clone())
            .use_sql_limit(config.use_sql_limit)
            .enable_sql_statistic(config.enable_sql_statistic)
            .build()
    }

    pub fn source(&self) -> &dyn ConnectionSource {
        self.source.as_ref()
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn metadata(&self) -> &MetadataCache {
        &self.cache
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn query<M: Model>(&self) -> Query<'_, M> {
        Query::new(self, None)
    }

    /// Explicit projection: `db.select("id, name").from::<Category>()`.
    pub fn select(&self, columns: &str) -> Select<'_> {
        Select::new(self, None, columns.to_string())
    }

    /// Query whose [`Query::execute`] runs an UPDATE.
    pub fn update<M: Model>(&self) -> Query<'_, M> {
        self.query().with_intent(DmlIntent::Update)
    }

    /// Query whose [`Query::execute`] runs a DELETE.
    pub fn delete<M: Model>(&self) -> Query<'_, M> {
        self.query().with_intent(DmlIntent::Delete)
    }

    /// Begin a transaction finished explicitly with `commit` or `rollback`.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        Transaction::begin(self)
    }

    /// Run `work` in a transaction; see [`crate::transaction`].
    pub fn atomic<T, F>(&self, work: F) -> Atomic<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        match Transaction::begin(self) {
            Ok(tx) => tx.run(work),
            Err(err) => {
                log::warn!("could not begin transaction: {err}");
                Atomic::failed(err, false)
            }
        }
    }

    pub fn save<M: Model>(&self, model: &M) -> Result<ResultKey> {
        self.query::<M>().save(model)
    }

    /// Insert every model in one transaction; keys come back in input order.
    pub fn save_batch<M: Model>(&self, models: &[M]) -> Atomic<Vec<ResultKey>> {
        self.atomic(|tx| models.iter().map(|model| tx.save(model)).collect())
    }

    pub fn delete_by_id<M: Model>(&self, id: impl IntoValue) -> Result<u64> {
        self.query::<M>().delete_by_id(id)
    }

    /// Delete every id in one transaction; returns the total row count.
    pub fn delete_batch<M, I, V>(&self, ids: I) -> Atomic<u64>
    where
        M: Model,
        I: IntoIterator<Item = V>,
        V: IntoValue,
    {
        self.atomic(|tx| {
            let mut deleted = 0;
            for id in ids {
                deleted += tx.query::<M>().delete_by_id(id)?;
            }
            Ok(deleted)
        })
    }

    /// Raw statement; returns the affected row count.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        Ok(self.exec_on(None, sql, params)?.rows_affected)
    }

    pub fn execute_and_get_key(&self, sql: &str, params: &[Value]) -> Result<ResultKey> {
        let result = self.exec_on(None, sql, params)?;
        Ok(ResultKey::new(result.last_insert_id))
    }

    /// Deferred raw select; nothing runs until `one`, `all`, `maps` or `page`.
    pub fn by_sql<T: FromRow>(&self, sql: &str, params: Vec<Value>) -> ResultList<'_, T> {
        ResultList::new(self, None, sql, params)
    }

    pub(crate) fn exec_on(
        &self,
        bound: Option<&dyn Connection>,
        sql: &str,
        params: &[Value],
    ) -> Result<ExecResult> {
        let lease = Lease::acquire(self, bound)?;
        execution::exec(self, lease.conn()?, sql, params)
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.dialect.name())
            .field("metadata", &self.cache)
            .field("options", &self.options)
            .finish()
    }
}

static DATABASE: OnceCell<Database> = OnceCell::new();

/// Install the process-wide database. Succeeds once; later calls fail and
/// leave the first handle in place.
pub fn install(db: Database) -> Result<&'static Database> {
    DATABASE.set(db).map_err(|_| {
        QuarryError::configuration(codes::BAD_CONFIGURATION, "a database is already installed")
    })?;
    database()
}

/// The database set by [`install`].
pub fn database() -> Result<&'static Database> {
    DATABASE.get().ok_or_else(|| {
        QuarryError::configuration(
            codes::DATABASE_NOT_CONFIGURED,
            "no database installed; call quarry::install first",
        )
    })
}
