//! DML terminals: insert, update, delete.
//!
//! Parameters are always bound in the order their placeholders are rendered:
//! model values (non-null, declaration order), then on-duplicate values,
//! then condition values.

use crate::backend::ExecResult;
use crate::error::{codes, QuarryError, Result};
use crate::model::Model;
use crate::query::execution::{self, Lease};
use crate::query::{DmlIntent, Query};
use crate::result::ResultKey;
use crate::value::{self, IntoValue, Value};

/// Non-null values of `columns`, skipping `skip`, in order.
fn bindable<'c>(
    columns: &'c [(String, Value)],
    skip: Option<&'c str>,
) -> impl Iterator<Item = Value> + 'c {
    columns
        .iter()
        .filter(move |(c, v)| !value::is_null(v) && Some(c.as_str()) != skip)
        .map(|(_, v)| v.clone())
}

impl<'a, M: Model> Query<'a, M> {
    fn run(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let lease = Lease::acquire(self.db, self.bound)?;
        execution::exec(self.db, lease.conn()?, sql, params)
    }

    /// Insert `model`; null fields are left to their column defaults.
    ///
    /// A model with every field null renders `INSERT INTO <table>` on the
    /// default dialect, which most drivers reject.
    pub fn save(&mut self, model: &M) -> Result<ResultKey> {
        let state = self.take_state()?;
        let mut params = self.sql_params(&state);
        params.condition.clear();
        params.column_values = self.column_values(model);
        let sql = self.db.dialect().insert(&params);
        let values: Vec<Value> = bindable(&params.column_values, None).collect();
        let result = self.run(&sql, &values)?;
        Ok(ResultKey::new(result.last_insert_id))
    }

    /// Insert `model`, updating the `#[update_on_duplicate]` columns when the key exists.
    ///
    /// The returned key is the model's own primary key when it has one. The
    /// driver's generated key only describes a fresh insert; on the update
    /// branch SQLite and MySQL leave it pointing at an earlier row.
    pub fn save_or_update_on_duplicate(&mut self, model: &M) -> Result<ResultKey> {
        let state = self.take_state()?;
        let mut params = self.sql_params(&state);
        params.condition.clear();
        params.column_values = self.column_values(model);
        params.duplicate_columns = self
            .meta
            .fields()
            .iter()
            .filter(|f| f.update_on_duplicate)
            .map(|f| f.column.clone())
            .collect();
        let sql = self.db.dialect().insert_on_duplicate(&params);

        let mut values: Vec<Value> = bindable(&params.column_values, None).collect();
        values.extend(
            params
                .column_values
                .iter()
                .filter(|(c, v)| !value::is_null(v) && params.duplicate_columns.contains(c))
                .map(|(_, v)| v.clone()),
        );
        let own_key = model
            .get(self.meta.primary_key_field())
            .filter(|v| !value::is_null(v));
        let result = self.run(&sql, &values)?;
        Ok(ResultKey::new(own_key.or(result.last_insert_id)))
    }

    /// Apply the `set(...)` assignments to the matching rows.
    pub fn update(&mut self) -> Result<u64> {
        let state = self.take_state()?;
        if state.updates.is_empty() {
            return Err(QuarryError::precondition(
                codes::EMPTY_UPDATE,
                format!("update on {} needs at least one set(...)", self.meta.table()),
            ));
        }
        let mut params = self.sql_params(&state);
        params.update_columns = state.updates.iter().map(|(c, _)| c.clone()).collect();
        let sql = self.db.dialect().update(&params)?;

        let mut values: Vec<Value> = state.updates.into_iter().map(|(_, v)| v).collect();
        values.extend(state.params);
        Ok(self.run(&sql, &values)?.rows_affected)
    }

    /// `set(...)` assignments applied to the row with primary key `id`.
    pub fn update_by_id(&mut self, id: impl IntoValue) -> Result<u64> {
        let pk = self.meta.primary_key_column().to_string();
        self.state.and(&format!("{pk} = ?"), [id.into_value()]);
        self.update()
    }

    /// Write the non-null fields of `model` to the row with primary key `id`.
    ///
    /// The primary key column is never written, even when `model` carries a
    /// key value different from `id`.
    pub fn update_model_by_id(&mut self, model: &M, id: impl IntoValue) -> Result<u64> {
        let mut state = self.take_state()?;
        let pk = self.meta.primary_key_column().to_string();
        state.and(&format!("{pk} = ?"), [id.into_value()]);

        let mut params = self.sql_params(&state);
        params.column_values = self.column_values(model);
        params.skip_column = Some(pk.clone());
        let sql = self.db.dialect().update(&params)?;

        let mut values: Vec<Value> = bindable(&params.column_values, Some(pk.as_str())).collect();
        values.extend(state.params);
        Ok(self.run(&sql, &values)?.rows_affected)
    }

    /// Write the non-null fields of `model`, keyed by its primary key.
    ///
    /// The key is taken out of the SET list. When `model` has no key value
    /// and no condition was given, the statement has no WHERE clause and
    /// updates every row of the table.
    pub fn update_by_model(&mut self, model: &M) -> Result<u64> {
        let mut state = self.take_state()?;
        let pk_column = self.meta.primary_key_column().to_string();
        let pk_value = model
            .get(self.meta.primary_key_field())
            .filter(|v| !value::is_null(v));

        let column_values = self.column_values(model);
        let mut values: Vec<Value> = bindable(&column_values, Some(pk_column.as_str())).collect();
        values.append(&mut state.params);
        if let Some(key) = pk_value {
            state.and(&format!("{pk_column} = ?"), [key.clone()]);
            values.push(key);
        } else if state.condition.is_empty() {
            log::warn!(
                "update_by_model on {} without a primary key value updates every row",
                self.meta.table()
            );
        }

        let mut params = self.sql_params(&state);
        params.column_values = column_values;
        params.skip_column = Some(pk_column);
        let sql = self.db.dialect().update(&params)?;
        Ok(self.run(&sql, &values)?.rows_affected)
    }

    /// Delete the rows matching the accumulated conditions.
    pub fn delete(&mut self) -> Result<u64> {
        let state = self.take_state()?;
        let params = self.sql_params(&state);
        let sql = self.db.dialect().delete(&params)?;
        Ok(self.run(&sql, &state.params)?.rows_affected)
    }

    pub fn delete_by_id(&mut self, id: impl IntoValue) -> Result<u64> {
        let pk = self.meta.primary_key_column().to_string();
        self.state.and(&format!("{pk} = ?"), [id.into_value()]);
        self.delete()
    }

    /// Delete by the accumulated conditions, or else by equality on every
    /// non-null field of `model`. Neither is an error.
    pub fn delete_by_model(&mut self, model: &M) -> Result<u64> {
        let state = self.take_state()?;
        let mut params = self.sql_params(&state);
        params.column_values = self.column_values(model);
        let sql = self.db.dialect().delete(&params)?;
        let values: Vec<Value> = if params.where_clause().is_empty() {
            bindable(&params.column_values, None).collect()
        } else {
            state.params
        };
        Ok(self.run(&sql, &values)?.rows_affected)
    }

    /// Run the statement this query was created for by
    /// [`Database::update`](crate::Database::update) or
    /// [`Database::delete`](crate::Database::delete).
    pub fn execute(&mut self) -> Result<u64> {
        match self.intent {
            Some(DmlIntent::Update) => self.update(),
            Some(DmlIntent::Delete) => self.delete(),
            None => {
                self.state = Default::default();
                Err(QuarryError::precondition(
                    codes::MODEL_NOT_BOUND,
                    "execute() needs a query created by update() or delete()",
                ))
            }
        }
    }
}
