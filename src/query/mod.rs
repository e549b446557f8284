//! Fluent query building and execution for models.
//!
//! A [`Query`] accumulates clauses (conditions, projection, ordering, joins,
//! assignments) and runs them through a terminal operation. The module is
//! split the way a query is used:
//! - **condition**: clause accumulation (`where_eq`, `gt`, `in_list`, `order_by`...)
//! - **select**: read terminals (`one`, `all`, `page`, `count`...)
//! - **write**: DML terminals (`save`, `update*`, `delete*`, `execute`)
//! - **join**: post-fetch join resolution
//! - **execution**: connection leases and instrumented statement execution
//!
//! # Examples
//!
//! ```no_run
//! use quarry::{Database, Model, OrderBy};
//!
//! #[derive(Debug, Default, Model)]
//! struct Category {
//!     #[primary_key]
//!     id: Option<i64>,
//!     name: Option<String>,
//! }
//!
//! # fn run(db: &Database) -> quarry::Result<()> {
//! let books = db
//!     .query::<Category>()
//!     .like(Category::NAME, "book%")
//!     .order_by(Category::ID, OrderBy::Desc)
//!     .all()?;
//! # Ok(())
//! # }
//! ```

pub(crate) mod condition;
pub(crate) mod execution;
pub mod join;
pub(crate) mod select;
pub(crate) mod write;

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::backend::Connection;
use crate::database::Database;
use crate::dialect::SqlParams;
use crate::error::Result;
use crate::metadata::ModelMeta;
use crate::model::{IntoColumn, Model};
use crate::value::Value;

use self::condition::QueryState;
pub use self::join::{FieldRef, JoinParam};

/// Sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    Asc,
    Desc,
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderBy::Asc => f.write_str("ASC"),
            OrderBy::Desc => f.write_str("DESC"),
        }
    }
}

/// Statement kind dispatched by [`Query::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmlIntent {
    Update,
    Delete,
}

/// Query bound to the model type `M`.
///
/// Clause methods take and return the builder. Terminal methods take
/// `&mut self`; each one clears the accumulated clauses on every outcome,
/// so a builder can be reused for sequential queries. Problems found while
/// accumulating (an unknown column accessor, a second `select`, an invalid
/// join) are kept and returned by the next terminal operation before any
/// statement reaches the database.
///
/// A query is not `Send`: build one per logical query on the thread that
/// runs it.
pub struct Query<'a, M: Model> {
    pub(crate) db: &'a Database,
    pub(crate) bound: Option<&'a dyn Connection>,
    pub(crate) meta: Arc<ModelMeta>,
    pub(crate) state: QueryState,
    pub(crate) intent: Option<DmlIntent>,
    pub(crate) use_sql: bool,
    _model: PhantomData<fn() -> M>,
}

impl<'a, M: Model> Query<'a, M> {
    pub(crate) fn new(db: &'a Database, bound: Option<&'a dyn Connection>) -> Self {
        Self {
            db,
            bound,
            meta: db.metadata().meta::<M>(),
            state: QueryState::default(),
            intent: None,
            use_sql: false,
            _model: PhantomData,
        }
    }

    pub(crate) fn with_intent(mut self, intent: DmlIntent) -> Self {
        self.intent = Some(intent);
        self
    }

    /// Table the query addresses.
    pub fn table(&self) -> &str {
        self.meta.table()
    }

    pub fn intent(&self) -> Option<DmlIntent> {
        self.intent
    }

    /// Treat statements given to [`Query::page_sql`] as opaque: their total is
    /// counted by wrapping them in `SELECT COUNT(*) FROM (...) tmp` instead of
    /// rewriting their `SELECT ... FROM` head. The mode survives terminal calls.
    pub fn use_sql(mut self) -> Self {
        self.use_sql = true;
        self
    }

    /// Condition text accumulated so far, as it will be rendered.
    pub fn condition(&self) -> &str {
        &self.state.condition
    }

    /// Values bound so far, in placeholder order.
    pub fn params(&self) -> &[Value] {
        &self.state.params
    }

    /// Resolve a column accessor, deferring the error on failure.
    pub(crate) fn column(&mut self, column: impl IntoColumn) -> Option<String> {
        match column.into_column(self.db.metadata()) {
            Ok(column) => Some(column),
            Err(err) => {
                self.state.defer(err);
                None
            }
        }
    }

    /// Take the clause state for a terminal operation, surfacing a deferred error.
    pub(crate) fn take_state(&mut self) -> Result<QueryState> {
        let mut state = std::mem::take(&mut self.state);
        match state.deferred.take() {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }

    /// Renderer input carrying the model's table facts and the given clauses.
    pub(crate) fn sql_params(&self, state: &QueryState) -> SqlParams {
        let mut params = SqlParams::new(self.meta.table(), self.meta.primary_key_column());
        params.condition = state.condition.clone();
        params.select_columns = state.select_columns.clone();
        params.excluded_columns = state.excluded.clone();
        params.all_columns = self.meta.fields().iter().map(|f| f.column.clone()).collect();
        params
    }

    /// Model values in declaration order, nulls included.
    pub(crate) fn column_values(&self, model: &M) -> Vec<(String, Value)> {
        self.meta
            .fields()
            .iter()
            .map(|f| {
                let value = model.get(f.name).unwrap_or_else(crate::value::null);
                (f.column.clone(), value)
            })
            .collect()
    }
}

impl<M: Model> fmt::Debug for Query<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("model", &M::DESCRIPTOR.type_name)
            .field("table", &self.meta.table())
            .field("condition", &self.state.condition)
            .field("params", &self.state.params.len())
            .field("intent", &self.intent)
            .field("bound", &self.bound.is_some())
            .finish()
    }
}

/// Column projection waiting for its model: `db.select("id, name").from::<M>()`.
pub struct Select<'a> {
    db: &'a Database,
    bound: Option<&'a dyn Connection>,
    columns: String,
}

impl<'a> Select<'a> {
    pub(crate) fn new(db: &'a Database, bound: Option<&'a dyn Connection>, columns: String) -> Self {
        Self { db, bound, columns }
    }

    pub fn from<M: Model>(self) -> Query<'a, M> {
        Query::new(self.db, self.bound).select(self.columns.as_str())
    }
}
