//! # Quarry
//!
//! Fluent, model-addressed SQL over pooled connections.
//!
//! Models derive [`Model`]; table and column names come from the type and
//! field names (`Category` → `categories`, `createdAt` → `created_at`) unless
//! overridden. A [`Database`] turns models into [`Query`] builders, renders
//! them through a [`Dialect`](dialect::Dialect), and runs the statements on
//! connections from its source, inside [`Transaction`]s when asked.
//!
//! ```no_run
//! use quarry::{Database, Model, OrderBy};
//!
//! #[derive(Debug, Default, Model)]
//! struct Category {
//!     #[primary_key]
//!     id: Option<i64>,
//!     #[update_on_duplicate]
//!     name: Option<String>,
//!     #[column_name = "descr"]
//!     description: Option<String>,
//! }
//!
//! # fn main() -> quarry::Result<()> {
//! let db = Database::open("sqlite://app.db")?;
//! let key = db.save(&Category { name: Some("books".into()), ..Default::default() })?;
//! let page = db
//!     .query::<Category>()
//!     .gt(Category::ID, 10)
//!     .order_by(Category::NAME, OrderBy::Asc)
//!     .page(1, 20)?;
//! println!("{} of {} categories, new key {}", page.rows.len(), page.total, key.as_long()?);
//! # Ok(())
//! # }
//! ```

extern crate self as quarry;

pub mod backend;
pub mod config;
pub mod database;
pub mod dialect;
pub mod error;
mod macros;
pub mod metadata;
pub mod metrics;
pub mod model;
pub mod pool;
pub mod query;
pub mod result;
pub mod row;
pub mod transaction;
pub mod translation;
pub mod value;

pub use quarry_derive::Model;

pub use config::QuarryConfig;
pub use database::{database, install, Database, DatabaseBuilder, Options};
pub use error::{ErrorKind, QuarryError, Result};
pub use metadata::{FieldMeta, MetadataCache, ModelMeta};
pub use model::{
    Col, FieldDescriptor, FromRow, IntoColumn, JoinFieldDescriptor, JoinShape, Model,
    ModelDescriptor,
};
pub use query::{DmlIntent, FieldRef, JoinParam, OrderBy, Query, Select};
pub use result::{Page, PageRow, ResultKey, ResultList};
pub use row::Row;
pub use transaction::{Atomic, RollbackPolicy, Transaction};
pub use value::{ColumnValue, IntoValue, Value};
