//! Clause accumulation.
//!
//! Every predicate appends its SQL fragment to the condition buffer and its
//! values to the parameter list in the same call, so the `?` markers of the
//! rendered WHERE clause and the bound values always line up.

use crate::error::{codes, QuarryError};
use crate::model::{IntoColumn, Model};
use crate::query::join::JoinParam;
use crate::query::{OrderBy, Query};
use crate::translation::count_placeholders;
use crate::value::{self, IntoValue, Value};

/// Clauses of one logical query. Emptied by every terminal operation.
#[derive(Debug, Default)]
pub(crate) struct QueryState {
    pub condition: String,
    pub params: Vec<Value>,
    pub order_by: String,
    pub excluded: Vec<String>,
    pub select_columns: Option<String>,
    /// `set(...)` assignments, in first-call order.
    pub updates: Vec<(String, Value)>,
    pub joins: Vec<JoinParam>,
    pub sql_limit: bool,
    /// First error met while accumulating.
    pub deferred: Option<QuarryError>,
}

impl QueryState {
    pub fn defer(&mut self, err: QuarryError) {
        if self.deferred.is_none() {
            self.deferred = Some(err);
        }
    }

    pub fn and(&mut self, fragment: &str, values: impl IntoIterator<Item = Value>) {
        self.condition.push_str(" AND ");
        self.condition.push_str(fragment);
        self.params.extend(values);
    }

    pub fn or(&mut self, fragment: &str, values: impl IntoIterator<Item = Value>) {
        self.condition.push_str(" OR (");
        self.condition.push_str(fragment);
        self.condition.push(')');
        self.params.extend(values);
    }

    /// `column IN (?, ...)`; nothing at all for an empty list.
    pub fn in_list(&mut self, column: &str, values: Vec<Value>) {
        if values.is_empty() {
            log::debug!("in_list on {column} with no values, condition skipped");
            return;
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        self.and(&format!("{column} IN ({placeholders})"), values);
    }

    pub fn order(&mut self, fragment: &str) {
        if !self.order_by.is_empty() {
            self.order_by.push(',');
        }
        self.order_by.push(' ');
        self.order_by.push_str(fragment);
    }

    pub fn set(&mut self, column: String, value: Value) {
        match self.updates.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.updates.push((column, value)),
        }
    }
}

/// `stmt` alone when it already carries a placeholder, else `stmt = ?`.
fn equality(statement: &str) -> String {
    if statement.contains('?') {
        statement.to_string()
    } else {
        format!("{statement} = ?")
    }
}

impl<M: Model> Query<'_, M> {
    /// Raw condition without bound values, e.g. `"deleted_at IS NULL"`.
    pub fn where_sql(self, statement: &str) -> Self {
        self.where_with(statement, Vec::new())
    }

    /// Raw condition with one value per `?` in `statement`.
    ///
    /// A count mismatch is reported by the next terminal operation.
    pub fn where_with(mut self, statement: &str, values: Vec<Value>) -> Self {
        let expected = count_placeholders(statement);
        if expected != values.len() {
            self.state.defer(QuarryError::configuration(
                codes::PLACEHOLDER_MISMATCH,
                format!(
                    "`{statement}` has {expected} placeholder(s) but {} value(s) were given",
                    values.len()
                ),
            ));
            return self;
        }
        self.state.and(statement, values);
        self
    }

    /// `column = ?`. A statement that already contains `?` is kept as written.
    pub fn where_eq(mut self, column: impl IntoColumn, value: impl IntoValue) -> Self {
        if let Some(statement) = self.column(column) {
            self.state.and(&equality(&statement), [value.into_value()]);
        }
        self
    }

    /// Equality on every field of `model` that is set; null and empty-string fields are skipped.
    pub fn where_model(mut self, model: &M) -> Self {
        let meta = self.meta.clone();
        for field in meta.fields() {
            match model.get(field.name) {
                Some(v) if !value::is_blank(&v) => {
                    self.state.and(&format!("{} = ?", field.column), [v]);
                }
                _ => {}
            }
        }
        self
    }

    pub fn and(self, column: impl IntoColumn, value: impl IntoValue) -> Self {
        self.where_eq(column, value)
    }

    /// `OR (column = ?)`, the one escape from the conjunctive buffer.
    pub fn or(mut self, column: impl IntoColumn, value: impl IntoValue) -> Self {
        if let Some(statement) = self.column(column) {
            self.state.or(&equality(&statement), [value.into_value()]);
        }
        self
    }

    pub fn not_eq(self, column: impl IntoColumn, value: impl IntoValue) -> Self {
        self.compare(column, "!=", value)
    }

    pub fn not_empty(self, column: impl IntoColumn) -> Self {
        self.suffix(column, " != ''")
    }

    pub fn not_null(self, column: impl IntoColumn) -> Self {
        self.suffix(column, " IS NOT NULL")
    }

    pub fn is_null(self, column: impl IntoColumn) -> Self {
        self.suffix(column, " IS NULL")
    }

    pub fn like(self, column: impl IntoColumn, value: impl IntoValue) -> Self {
        self.compare(column, "LIKE", value)
    }

    pub fn between(mut self, column: impl IntoColumn, low: impl IntoValue, high: impl IntoValue) -> Self {
        if let Some(column) = self.column(column) {
            self.state.and(
                &format!("{column} BETWEEN ? and ?"),
                [low.into_value(), high.into_value()],
            );
        }
        self
    }

    pub fn gt(self, column: impl IntoColumn, value: impl IntoValue) -> Self {
        self.compare(column, ">", value)
    }

    pub fn gte(self, column: impl IntoColumn, value: impl IntoValue) -> Self {
        self.compare(column, ">=", value)
    }

    pub fn lt(self, column: impl IntoColumn, value: impl IntoValue) -> Self {
        self.compare(column, "<", value)
    }

    pub fn lte(self, column: impl IntoColumn, value: impl IntoValue) -> Self {
        self.compare(column, "<=", value)
    }

    /// `column IN (?, ?, ...)`.
    ///
    /// An empty list adds nothing: the condition is dropped rather than
    /// matching zero rows. Guard against empty input when that matters.
    pub fn in_list<I, V>(mut self, column: impl IntoColumn, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: IntoValue,
    {
        let values: Vec<Value> = values.into_iter().map(IntoValue::into_value).collect();
        if let Some(column) = self.column(column) {
            self.state.in_list(&column, values);
        }
        self
    }

    /// Explicit projection. May be set once per query.
    pub fn select(mut self, columns: &str) -> Self {
        self.project(columns.to_string());
        self
    }

    /// Projection by typed columns: `select_cols([Category::ID, Category::NAME])`.
    /// Shares the once-per-query rule with [`Query::select`].
    pub fn select_cols<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: IntoColumn,
    {
        let mut resolved = Vec::new();
        for column in columns {
            match self.column(column) {
                Some(column) => resolved.push(column),
                None => return self,
            }
        }
        self.project(resolved.join(", "));
        self
    }

    fn project(&mut self, columns: String) {
        if self.state.select_columns.is_some() {
            self.state.defer(QuarryError::configuration(
                codes::SELECT_TWICE,
                "select(...) can only be called once per query",
            ));
            return;
        }
        self.state.select_columns = Some(columns);
    }

    /// Leave columns out of the projection; the rest are listed explicitly.
    pub fn exclude<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: IntoColumn,
    {
        for column in columns {
            if let Some(column) = self.column(column) {
                self.state.excluded.push(column);
            }
        }
        self
    }

    /// Raw ordering fragment such as `"created_at DESC"`.
    pub fn order(mut self, order: &str) -> Self {
        self.state.order(order);
        self
    }

    pub fn order_by(mut self, column: impl IntoColumn, direction: OrderBy) -> Self {
        if let Some(column) = self.column(column) {
            self.state.order(&format!("{column} {direction}"));
        }
        self
    }

    /// Assignment for [`Query::update`]. Setting a column again replaces its value.
    pub fn set(mut self, column: impl IntoColumn, value: impl IntoValue) -> Self {
        if let Some(column) = self.column(column) {
            self.state.set(column, value.into_value());
        }
        self
    }

    fn compare(mut self, column: impl IntoColumn, operator: &str, value: impl IntoValue) -> Self {
        if let Some(column) = self.column(column) {
            self.state
                .and(&format!("{column} {operator} ?"), [value.into_value()]);
        }
        self
    }

    fn suffix(mut self, column: impl IntoColumn, suffix: &str) -> Self {
        if let Some(column) = self.column(column) {
            self.state.and(&format!("{column}{suffix}"), []);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_buffers() {
        let mut state = QueryState::default();
        state.and("a = ?", [Value::from(1i64)]);
        state.or("b = ?", [Value::from(2i64)]);
        state.and("c BETWEEN ? and ?", [Value::from(3i64), Value::from(4i64)]);
        assert_eq!(state.condition, " AND a = ? OR (b = ?) AND c BETWEEN ? and ?");
        assert_eq!(count_placeholders(&state.condition), state.params.len());
    }

    #[test]
    fn test_empty_in_list_is_a_no_op() {
        let mut state = QueryState::default();
        state.and("a = ?", [Value::from(1i64)]);
        let before = state.condition.clone();
        state.in_list("b", Vec::new());
        assert_eq!(state.condition, before);
        assert_eq!(state.params.len(), 1);

        state.in_list("b", vec![Value::from(2i64), Value::from(3i64)]);
        assert_eq!(state.condition, " AND a = ? AND b IN (?, ?)");
        assert_eq!(state.params.len(), 3);
    }

    #[test]
    fn test_order_buffer() {
        let mut state = QueryState::default();
        state.order("id DESC");
        state.order("name ASC");
        state.order("id DESC");
        assert_eq!(state.order_by, " id DESC, name ASC, id DESC");
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut state = QueryState::default();
        state.set("a".into(), Value::from(1i64));
        state.set("b".into(), Value::from(2i64));
        state.set("a".into(), Value::from(3i64));
        assert_eq!(
            state.updates,
            vec![
                ("a".to_string(), Value::from(3i64)),
                ("b".to_string(), Value::from(2i64))
            ]
        );
    }

    #[test]
    fn test_first_deferred_error_wins() {
        let mut state = QueryState::default();
        state.defer(QuarryError::configuration(codes::SELECT_TWICE, "first"));
        state.defer(QuarryError::configuration(codes::UNKNOWN_COLUMN, "second"));
        assert_eq!(state.deferred.map(|e| e.code()), Some(codes::SELECT_TWICE));
    }

    #[test]
    fn test_equality_keeps_explicit_placeholder() {
        assert_eq!(equality("age > ?"), "age > ?");
        assert_eq!(equality("age"), "age = ?");
    }
}
