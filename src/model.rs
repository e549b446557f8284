//! Model introspection.
//!
//! `#[derive(Model)]` (from `quarry-derive`) implements [`Model`] with a static
//! [`ModelDescriptor`], name-dispatched accessors, [`FromRow`], and one
//! [`Col`] constant per persistable field. The helpers at the bottom of this
//! module are called from the generated code.

use std::fmt;
use std::marker::PhantomData;

use crate::error::{codes, QuarryError, Result};
use crate::metadata::MetadataCache;
use crate::row::Row;
use crate::value::{self, ColumnValue, Value};

/// Static description of a persistable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    /// `#[column_name = ".."]` override.
    pub column: Option<&'static str>,
    pub update_on_duplicate: bool,
}

/// Destination shape of a join field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinShape {
    /// `Option<T>` or `T`: first matching row.
    One,
    /// `Vec<T>`: every matching row, in order.
    Many,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinFieldDescriptor {
    pub name: &'static str,
    pub shape: JoinShape,
}

/// Compile-time descriptor table of a model type.
#[derive(Debug, Clone, Copy)]
pub struct ModelDescriptor {
    /// Simple type name, source of the derived table name.
    pub type_name: &'static str,
    /// `#[table_name = ".."]` override.
    pub table_name: Option<&'static str>,
    /// Field carrying `#[primary_key]`.
    pub primary_key: Option<&'static str>,
    /// Persistable fields in declaration order.
    pub fields: &'static [FieldDescriptor],
    pub joins: &'static [JoinFieldDescriptor],
}

/// A persistable entity type.
pub trait Model: Default + Send + 'static {
    const DESCRIPTOR: ModelDescriptor;

    /// Current value of a persistable field, `None` for unknown names.
    fn get(&self, field: &str) -> Option<Value>;

    fn set(&mut self, field: &str, value: Value) -> Result<()>;

    /// Fill a `#[join]` field from the rows of its point query.
    fn set_joined(&mut self, field: &str, rows: Vec<Row>, cache: &MetadataCache) -> Result<()>;
}

/// Mapping of a result row onto a Rust value.
///
/// Models get an implementation from the derive. Scalars read the first
/// column, which is what `SELECT COUNT(*)`-style statements return.
pub trait FromRow: Sized {
    fn from_row(row: &Row, cache: &MetadataCache) -> Result<Self>;
}

macro_rules! scalar_from_row {
    ($($ty:ty),*) => {
        $(
            impl FromRow for $ty {
                fn from_row(row: &Row, _cache: &MetadataCache) -> Result<Self> {
                    <$ty as ColumnValue>::from_value(first_cell(row))
                }
            }
        )*
    };
}

scalar_from_row!(
    i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, bool, String, Vec<u8>,
    serde_json::Value, chrono::NaiveDate, chrono::NaiveDateTime,
    chrono::DateTime<chrono::Utc>, Value
);

impl<T: ColumnValue> FromRow for Option<T> {
    fn from_row(row: &Row, _cache: &MetadataCache) -> Result<Self> {
        Option::<T>::from_value(first_cell(row))
    }
}

impl FromRow for Row {
    fn from_row(row: &Row, _cache: &MetadataCache) -> Result<Self> {
        Ok(row.clone())
    }
}

fn first_cell(row: &Row) -> Value {
    row.get_index(0).cloned().unwrap_or_else(value::null)
}

/// Typed reference to a persistable field of `M`.
///
/// Generated as `Model::FIELD_NAME` constants and resolved to a column name
/// through the metadata cache.
pub struct Col<M> {
    field: &'static str,
    _model: PhantomData<fn() -> M>,
}

impl<M> Col<M> {
    pub const fn new(field: &'static str) -> Self {
        Self {
            field,
            _model: PhantomData,
        }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }
}

impl<M> Clone for Col<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for Col<M> {}

impl<M> fmt::Debug for Col<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Col({})", self.field)
    }
}

/// Column identification accepted by the query builder: a literal column
/// name, or a typed accessor resolved through the cache.
pub trait IntoColumn {
    fn into_column(self, cache: &MetadataCache) -> Result<String>;
}

impl IntoColumn for &str {
    fn into_column(self, _cache: &MetadataCache) -> Result<String> {
        Ok(self.to_string())
    }
}

impl IntoColumn for String {
    fn into_column(self, _cache: &MetadataCache) -> Result<String> {
        Ok(self)
    }
}

impl IntoColumn for &String {
    fn into_column(self, _cache: &MetadataCache) -> Result<String> {
        Ok(self.clone())
    }
}

impl<M: Model> IntoColumn for Col<M> {
    fn into_column(self, cache: &MetadataCache) -> Result<String> {
        cache.resolve::<M>(self.field)
    }
}

/// Build a model from a row. Columns without a matching field, and cells
/// that do not convert, leave the field at its default.
pub fn map_row<M: Model>(row: &Row, cache: &MetadataCache) -> M {
    let meta = cache.meta::<M>();
    let mut model = M::default();
    for (column, cell) in row.iter() {
        if let Some(field) = meta.field_for_column(column) {
            if let Err(err) = model.set(field, cell.clone()) {
                log::trace!(
                    "skipping column {column} of {}: {err}",
                    M::DESCRIPTOR.type_name
                );
            }
        }
    }
    model
}

pub fn join_one<T: Model>(rows: Vec<Row>, cache: &MetadataCache) -> Option<T> {
    rows.first().map(|row| map_row::<T>(row, cache))
}

pub fn join_many<T: Model>(rows: Vec<Row>, cache: &MetadataCache) -> Vec<T> {
    rows.iter().map(|row| map_row::<T>(row, cache)).collect()
}

pub fn unknown_field(type_name: &str, field: &str) -> QuarryError {
    QuarryError::configuration(
        codes::UNKNOWN_COLUMN,
        format!("{type_name} has no persistable field `{field}`"),
    )
}

pub fn invalid_join(type_name: &str, field: &str) -> QuarryError {
    QuarryError::configuration(
        codes::INVALID_JOIN,
        format!("{type_name}.{field} is not declared with #[join]"),
    )
}
