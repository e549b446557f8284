//! Generated keys, pages and deferred raw-SQL results.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use crate::backend::Connection;
use crate::database::Database;
use crate::error::{QuarryError, Result};
use crate::model::FromRow;
use crate::query::{execution, select};
use crate::value::{self, Value};

/// Key generated by an INSERT.
///
/// Drivers report keys in different native shapes (`INTEGER`, `BIGINT`,
/// text...). The accessors convert between integral widths when the value
/// fits and fail with [`QuarryError::Cast`] otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultKey(Value);

impl ResultKey {
    pub fn new(value: Option<Value>) -> Self {
        Self(value.unwrap_or_else(value::null))
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// False when the statement did not report a key.
    pub fn is_present(&self) -> bool {
        !value::is_null(&self.0)
    }

    pub fn as_int(&self) -> Result<i32> {
        self.integral("i32")
            .and_then(|v| i32::try_from(v).map_err(|_| self.cast_error("i32")))
    }

    pub fn as_long(&self) -> Result<i64> {
        self.integral("i64")
            .and_then(|v| i64::try_from(v).map_err(|_| self.cast_error("i64")))
    }

    pub fn as_big_integer(&self) -> Result<i128> {
        self.integral("i128")
    }

    pub fn as_string(&self) -> Result<String> {
        if !self.is_present() {
            return Err(self.cast_error("String"));
        }
        value::as_text(&self.0).ok_or_else(|| self.cast_error("String"))
    }

    fn integral(&self, expected: &'static str) -> Result<i128> {
        value::as_integer(&self.0).ok_or_else(|| self.cast_error(expected))
    }

    fn cast_error(&self, expected: &'static str) -> QuarryError {
        QuarryError::Cast {
            expected,
            actual: format!("{:?}", self.0),
        }
    }
}

/// Requested page. Numbers are 1-based; page 0 is read as page 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRow {
    pub page_num: usize,
    pub page_size: usize,
}

impl PageRow {
    pub fn new(page_num: usize, page_size: usize) -> Self {
        Self {
            page_num: page_num.max(1),
            page_size,
        }
    }

    /// Rows skipped before this page.
    pub fn offset(&self) -> usize {
        self.page_size.saturating_mul(self.page_num.max(1) - 1)
    }
}

impl Default for PageRow {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

/// One page of results plus the total row count of the unpaged query.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub total: u64,
    pub page_num: usize,
    pub page_size: usize,
    pub rows: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(total: u64, page_row: PageRow, rows: Vec<T>) -> Self {
        Self {
            total,
            page_num: page_row.page_num,
            page_size: page_row.page_size,
            rows,
        }
    }

    /// `ceil(total / page_size)`; zero when the page size is zero.
    pub fn page_count(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size as u64)
    }

    pub fn has_next(&self) -> bool {
        (self.page_num as u64) < self.page_count()
    }

    pub fn has_prev(&self) -> bool {
        self.page_num > 1
    }

    pub fn next_page(&self) -> Option<usize> {
        self.has_next().then_some(self.page_num + 1)
    }

    pub fn prev_page(&self) -> Option<usize> {
        self.has_prev().then_some(self.page_num - 1)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            total: self.total,
            page_num: self.page_num,
            page_size: self.page_size,
            rows: self.rows.into_iter().map(f).collect(),
        }
    }
}

/// Raw statement whose execution is deferred until a terminal call.
///
/// Created by [`Database::by_sql`] and [`Transaction::by_sql`](crate::Transaction::by_sql).
/// Rows map through [`FromRow`], so `T` can be a model or a scalar.
pub struct ResultList<'a, T> {
    db: &'a Database,
    bound: Option<&'a dyn Connection>,
    sql: String,
    params: Vec<Value>,
    _row: PhantomData<fn() -> T>,
}

impl<'a, T: FromRow> ResultList<'a, T> {
    pub(crate) fn new(
        db: &'a Database,
        bound: Option<&'a dyn Connection>,
        sql: impl Into<String>,
        params: Vec<Value>,
    ) -> Self {
        Self {
            db,
            bound,
            sql: sql.into(),
            params,
            _row: PhantomData,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// First row, or `None`.
    pub fn one(&self) -> Result<Option<T>> {
        let lease = execution::Lease::acquire(self.db, self.bound)?;
        let rows = execution::fetch(self.db, lease.conn()?, &self.sql, &self.params)?;
        rows.first()
            .map(|row| T::from_row(row, self.db.metadata()))
            .transpose()
    }

    pub fn all(&self) -> Result<Vec<T>> {
        let lease = execution::Lease::acquire(self.db, self.bound)?;
        let rows = execution::fetch(self.db, lease.conn()?, &self.sql, &self.params)?;
        rows.iter()
            .map(|row| T::from_row(row, self.db.metadata()))
            .collect()
    }

    /// Rows as column → value maps.
    pub fn maps(&self) -> Result<Vec<BTreeMap<String, Value>>> {
        let lease = execution::Lease::acquire(self.db, self.bound)?;
        let rows = execution::fetch(self.db, lease.conn()?, &self.sql, &self.params)?;
        Ok(rows.into_iter().map(|row| row.into_map()).collect())
    }

    /// Page of the statement; the total comes from `SELECT COUNT(*) FROM (<sql>) tmp`.
    pub fn page(&self, page_row: PageRow) -> Result<Page<T>> {
        let lease = execution::Lease::acquire(self.db, self.bound)?;
        let raw = select::page_rows(
            self.db,
            lease.conn()?,
            &self.sql,
            &self.params,
            "",
            page_row,
            true,
        )?;
        let rows = raw
            .rows
            .iter()
            .map(|row| T::from_row(row, self.db.metadata()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(raw.total, page_row, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;

    #[test]
    fn test_key_widening_and_narrowing() {
        let key = ResultKey::new(Some(Value::from(42i64)));
        assert!(key.is_present());
        assert_eq!(key.as_int().unwrap(), 42);
        assert_eq!(key.as_long().unwrap(), 42);
        assert_eq!(key.as_big_integer().unwrap(), 42);
        assert_eq!(key.as_string().unwrap(), "42");

        let small = ResultKey::new(Some(Value::from(7i32)));
        assert_eq!(small.as_long().unwrap(), 7);
    }

    #[test]
    fn test_key_out_of_range() {
        let key = ResultKey::new(Some(Value::from(9_999_999_999i64)));
        let err = key.as_int().unwrap_err();
        assert_eq!(err.code(), codes::CAST);
        assert_eq!(key.as_long().unwrap(), 9_999_999_999);
    }

    #[test]
    fn test_text_key() {
        let key = ResultKey::new(Some(Value::from("a1b2".to_string())));
        assert_eq!(key.as_string().unwrap(), "a1b2");
        assert!(key.as_long().is_err());

        let numeric = ResultKey::new(Some(Value::from("15".to_string())));
        assert_eq!(numeric.as_int().unwrap(), 15);
    }

    #[test]
    fn test_absent_key() {
        let key = ResultKey::new(None);
        assert!(!key.is_present());
        assert!(key.as_long().is_err());
        assert!(key.as_string().is_err());
    }

    #[test]
    fn test_page_row() {
        assert_eq!(PageRow::new(0, 10), PageRow::new(1, 10));
        assert_eq!(PageRow::new(1, 10).offset(), 0);
        assert_eq!(PageRow::new(3, 10).offset(), 20);
        assert_eq!(PageRow::default().page_size, 10);
    }

    #[test]
    fn test_page_arithmetic() {
        let page = Page::new(25, PageRow::new(3, 10), vec![1, 2, 3, 4, 5]);
        assert_eq!(page.page_count(), 3);
        assert!(!page.has_next());
        assert!(page.has_prev());
        assert_eq!(page.prev_page(), Some(2));
        assert_eq!(page.next_page(), None);

        let first = Page::new(25, PageRow::new(1, 10), Vec::<i32>::new());
        assert!(first.has_next());
        assert!(!first.has_prev());
        assert!(first.is_empty());

        let empty = Page::new(0, PageRow::new(1, 0), Vec::<i32>::new());
        assert_eq!(empty.page_count(), 0);
    }

    #[test]
    fn test_page_map() {
        let page = Page::new(2, PageRow::new(1, 10), vec![1, 2]).map(|v| v * 10);
        assert_eq!(page.rows, vec![10, 20]);
        assert_eq!(page.total, 2);
    }
}
