//! Read terminals.

use std::collections::BTreeMap;

use regex::Regex;

use crate::backend::Connection;
use crate::database::Database;
use crate::dialect::SqlParams;
use crate::error::{QuarryError, Result};
use crate::model::{map_row, Model};
use crate::query::condition::QueryState;
use crate::query::execution::{self, Lease};
use crate::query::{join, Query};
use crate::result::{Page, PageRow};
use crate::row::Row;
use crate::value::{self, IntoValue, Value};

/// `sql LIMIT 1` when native limits are enabled.
pub(crate) fn first_row_sql(db: &Database, sql: &str) -> String {
    if db.options().use_sql_limit {
        format!("{sql} LIMIT 1")
    } else {
        sql.to_string()
    }
}

/// COUNT statement for a select: wrapped as a derived table, or with its
/// `SELECT ... FROM` head replaced by `SELECT COUNT(*) FROM`.
pub(crate) fn count_sql(sql: &str, wrap: bool) -> Result<String> {
    if wrap {
        return Ok(format!("SELECT COUNT(*) FROM ({sql}) tmp"));
    }
    let head = Regex::new(r"(?is)^\s*select\b.*?\bfrom\b")
        .map_err(|e| QuarryError::Execution(format!("Invalid regex: {e}")))?;
    if head.is_match(sql) {
        Ok(head.replace(sql, "SELECT COUNT(*) FROM").into_owned())
    } else {
        Ok(format!("SELECT COUNT(*) FROM ({sql}) tmp"))
    }
}

/// First cell of the first row as a count; zero when there is none.
fn count_of(rows: &[Row]) -> i64 {
    rows.first()
        .and_then(|row| row.get_index(0))
        .and_then(value::as_integer)
        .and_then(|n| i64::try_from(n).ok())
        .unwrap_or(0)
}

/// Count first, then fetch the page only when something matched.
pub(crate) fn page_rows(
    db: &Database,
    conn: &dyn Connection,
    sql: &str,
    params: &[Value],
    order_by: &str,
    page_row: PageRow,
    wrap_count: bool,
) -> Result<Page<Row>> {
    let count = count_of(&execution::fetch(db, conn, &count_sql(sql, wrap_count)?, params)?);
    let total = u64::try_from(count).unwrap_or(0);
    if total == 0 {
        return Ok(Page::new(0, page_row, Vec::new()));
    }

    let mut paged = SqlParams::default();
    paged.custom_sql = Some(sql.to_string());
    paged.order_by = order_by.to_string();
    paged.page_row = Some(page_row);
    let page_sql = db.dialect().paginate(&paged);

    let rows = execution::fetch(db, conn, &page_sql, params)?;
    Ok(Page::new(total, page_row, rows))
}

impl<'a, M: Model> Query<'a, M> {
    fn select_params(&self, state: &QueryState, with_order: bool) -> SqlParams {
        let mut params = self.sql_params(state);
        if with_order {
            params.order_by = state.order_by.clone();
        }
        params.sql_limit = state.sql_limit;
        params
    }

    fn load(&self, conn: &dyn Connection, sql: &str, state: &QueryState, first: bool) -> Result<Vec<M>> {
        let mut rows = execution::fetch(self.db, conn, sql, &state.params)?;
        if first {
            rows.truncate(1);
        }
        let cache = self.db.metadata();
        let mut models: Vec<M> = rows.iter().map(|row| map_row(row, cache)).collect();
        join::resolve(self.db, conn, &self.meta, &state.joins, &mut models)?;
        Ok(models)
    }

    fn load_first(&self, sql: &str, state: &QueryState) -> Result<Option<M>> {
        let lease = Lease::acquire(self.db, self.bound)?;
        let sql = first_row_sql(self.db, sql);
        Ok(self.load(lease.conn()?, &sql, state, true)?.pop())
    }

    /// First matching row, joins resolved.
    pub fn one(&mut self) -> Result<Option<M>> {
        let state = self.take_state()?;
        let sql = self.db.dialect().select(&self.select_params(&state, true));
        self.load_first(&sql, &state)
    }

    /// Every matching row in query order, joins resolved.
    pub fn all(&mut self) -> Result<Vec<M>> {
        let state = self.take_state()?;
        let sql = self.db.dialect().select(&self.select_params(&state, true));
        let lease = Lease::acquire(self.db, self.bound)?;
        self.load(lease.conn()?, &sql, &state, false)
    }

    /// Matching rows as column → value maps. Joins are not resolved.
    pub fn maps(&mut self) -> Result<Vec<BTreeMap<String, Value>>> {
        let state = self.take_state()?;
        let sql = self.db.dialect().select(&self.select_params(&state, true));
        let lease = Lease::acquire(self.db, self.bound)?;
        let rows = execution::fetch(self.db, lease.conn()?, &sql, &state.params)?;
        Ok(rows.into_iter().map(Row::into_map).collect())
    }

    pub fn iter(&mut self) -> Result<std::vec::IntoIter<M>> {
        Ok(self.all()?.into_iter())
    }

    /// Rows of [`Query::all`] kept by `predicate`.
    pub fn filter<P>(&mut self, mut predicate: P) -> Result<Vec<M>>
    where
        P: FnMut(&M) -> bool,
    {
        Ok(self.all()?.into_iter().filter(|m| predicate(m)).collect())
    }

    pub fn map<R, F>(&mut self, f: F) -> Result<Vec<R>>
    where
        F: FnMut(M) -> R,
    {
        Ok(self.all()?.into_iter().map(f).collect())
    }

    /// Row whose primary key equals `id`. Ordering clauses are ignored.
    pub fn by_id(&mut self, id: impl IntoValue) -> Result<Option<M>> {
        let mut state = self.take_state()?;
        state.and(
            &format!("{} = ?", self.meta.primary_key_column()),
            [id.into_value()],
        );
        let sql = self.db.dialect().select(&self.select_params(&state, false));
        self.load_first(&sql, &state)
    }

    /// Rows whose primary key is one of `ids`.
    ///
    /// An empty `ids` adds no condition, so every row matches.
    pub fn by_ids<I, V>(&mut self, ids: I) -> Result<Vec<M>>
    where
        I: IntoIterator<Item = V>,
        V: IntoValue,
    {
        let pk = self.meta.primary_key_column().to_string();
        let ids = ids.into_iter().map(IntoValue::into_value).collect();
        self.state.in_list(&pk, ids);
        self.all()
    }

    /// At most `n` rows: a bound `LIMIT ?` when native limits are enabled,
    /// otherwise every row is fetched and the result truncated.
    pub fn limit(&mut self, n: usize) -> Result<Vec<M>> {
        if self.db.options().use_sql_limit {
            self.state.sql_limit = true;
            self.state
                .params
                .push(Value::from(i64::try_from(n).unwrap_or(i64::MAX)));
            return self.all();
        }
        let mut rows = self.all()?;
        rows.truncate(n);
        Ok(rows)
    }

    pub fn count(&mut self) -> Result<i64> {
        let state = self.take_state()?;
        let sql = self.db.dialect().count(&self.sql_params(&state));
        let lease = Lease::acquire(self.db, self.bound)?;
        let rows = execution::fetch(self.db, lease.conn()?, &sql, &state.params)?;
        Ok(count_of(&rows))
    }

    /// Page `page_num` (1-based) of `page_size` rows.
    pub fn page(&mut self, page_num: usize, page_size: usize) -> Result<Page<M>> {
        self.page_row(PageRow::new(page_num, page_size))
    }

    /// Runs the COUNT first; when it is zero the row query is skipped.
    pub fn page_row(&mut self, page_row: PageRow) -> Result<Page<M>> {
        let state = self.take_state()?;
        let sql = self.db.dialect().select(&self.select_params(&state, false));
        self.paged(&sql, state, page_row)
    }

    /// Page over a pre-built select bound to the accumulated values.
    ///
    /// With [`Query::use_sql`] the total is counted over the statement as a
    /// derived table; otherwise its `SELECT ... FROM` head is rewritten.
    pub fn page_sql(&mut self, sql: &str, page_row: PageRow) -> Result<Page<M>> {
        let state = self.take_state()?;
        self.paged(sql, state, page_row)
    }

    fn paged(&self, sql: &str, state: QueryState, page_row: PageRow) -> Result<Page<M>> {
        let lease = Lease::acquire(self.db, self.bound)?;
        let conn = lease.conn()?;
        let raw = page_rows(
            self.db,
            conn,
            sql,
            &state.params,
            &state.order_by,
            page_row,
            self.use_sql,
        )?;
        let cache = self.db.metadata();
        let mut models: Vec<M> = raw.rows.iter().map(|row| map_row(row, cache)).collect();
        join::resolve(self.db, conn, &self.meta, &state.joins, &mut models)?;
        Ok(Page::new(raw.total, page_row, models))
    }
}
