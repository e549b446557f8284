//! Binding of [`Value`]s as `may_postgres` parameters, and reading them back.
//!
//! Parameters are first converted into owned, typed values; the closure then
//! receives `&dyn ToSql` references into that storage, which stays alive for
//! the duration of the call.

use may_postgres::types::ToSql;
use may_postgres::Row as PgRow;

use crate::error::{QuarryError, Result};
use crate::value::{self, ColumnValue, Value};

/// Convert values and run `f` with the bound parameter slice.
pub fn with_params<F, R>(values: &[Value], f: F) -> Result<R>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R>,
{
    let owned = values.iter().map(to_owned_param).collect::<Result<Vec<_>>>()?;
    let params: Vec<&dyn ToSql> = owned.iter().map(|p| p.as_ref() as &dyn ToSql).collect();
    f(&params)
}

fn to_owned_param(value: &Value) -> Result<Box<dyn ToSql + Sync>> {
    let param: Box<dyn ToSql + Sync> = match value {
        Value::Bool(v) => Box::new(*v),
        Value::TinyInt(v) => Box::new(v.map(i16::from)),
        Value::SmallInt(v) => Box::new(*v),
        Value::Int(v) => Box::new(*v),
        Value::BigInt(v) => Box::new(*v),
        Value::TinyUnsigned(v) => Box::new(v.map(i16::from)),
        Value::SmallUnsigned(v) => Box::new(v.map(i32::from)),
        Value::Unsigned(v) => Box::new(v.map(i64::from)),
        Value::BigUnsigned(v) => {
            let converted = match v {
                Some(u) => Some(i64::try_from(*u).map_err(|_| {
                    QuarryError::Execution(format!(
                        "BigUnsigned value {u} exceeds i64::MAX, cannot be bound"
                    ))
                })?),
                None => None,
            };
            Box::new(converted)
        }
        Value::Float(v) => Box::new(*v),
        Value::Double(v) => Box::new(*v),
        Value::String(v) => Box::new(v.as_ref().map(|s| s.to_string())),
        Value::Char(v) => Box::new(v.map(|c| c.to_string())),
        Value::Bytes(v) => Box::new(v.as_ref().map(|b| b.to_vec())),
        Value::Json(v) => Box::new(v.as_ref().map(|j| j.to_string())),
        other => {
            return Err(QuarryError::Execution(format!(
                "Unsupported value type in query: {other:?}"
            )));
        }
    };
    Ok(param)
}

/// Read one cell, choosing the Rust type from the column's PostgreSQL type.
pub fn read_cell(row: &PgRow, idx: usize) -> Result<Value> {
    let type_name = row.columns()[idx].type_().name().to_string();
    let cell = match type_name.as_str() {
        "bool" => Value::from(row.try_get::<_, Option<bool>>(idx)?),
        "int2" => Value::from(row.try_get::<_, Option<i16>>(idx)?),
        "int4" => Value::from(row.try_get::<_, Option<i32>>(idx)?),
        "int8" => Value::from(row.try_get::<_, Option<i64>>(idx)?),
        "float4" => Value::from(row.try_get::<_, Option<f32>>(idx)?),
        "float8" => Value::from(row.try_get::<_, Option<f64>>(idx)?),
        "bytea" => Value::from(row.try_get::<_, Option<Vec<u8>>>(idx)?),
        "date" => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)?
            .to_value(),
        "timestamp" => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)?
            .to_value(),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)?
            .to_value(),
        _ => match row.try_get::<_, Option<String>>(idx) {
            Ok(text) => Value::from(text),
            Err(err) => {
                log::trace!("column {idx} of type {type_name} read as NULL: {err}");
                value::null()
            }
        },
    };
    Ok(cell)
}
