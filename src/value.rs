//! Bound values and field conversions.
//!
//! Parameters, row cells and model field values all travel as
//! [`sea_query::Value`]. [`ColumnValue`] converts Rust field types to and from
//! that representation; conversions are lenient across integer widths but
//! range-checked.

use crate::error::{QuarryError, Result};
pub use sea_query::Value;

/// An untyped SQL NULL.
pub fn null() -> Value {
    Value::String(None)
}

/// Returns true when the value is SQL NULL, whatever its declared type.
pub fn is_null(value: &Value) -> bool {
    match value {
        Value::Bool(v) => v.is_none(),
        Value::TinyInt(v) => v.is_none(),
        Value::SmallInt(v) => v.is_none(),
        Value::Int(v) => v.is_none(),
        Value::BigInt(v) => v.is_none(),
        Value::TinyUnsigned(v) => v.is_none(),
        Value::SmallUnsigned(v) => v.is_none(),
        Value::Unsigned(v) => v.is_none(),
        Value::BigUnsigned(v) => v.is_none(),
        Value::Float(v) => v.is_none(),
        Value::Double(v) => v.is_none(),
        Value::String(v) => v.is_none(),
        Value::Char(v) => v.is_none(),
        Value::Bytes(v) => v.is_none(),
        Value::Json(v) => v.is_none(),
        _ => false,
    }
}

/// NULL, or a string with no characters. Used when a model acts as a filter template.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::String(Some(s)) => s.is_empty(),
        other => is_null(other),
    }
}

/// Integral view of a value, accepting every integer width and numeric text.
pub fn as_integer(value: &Value) -> Option<i128> {
    match value {
        Value::TinyInt(Some(v)) => Some(i128::from(*v)),
        Value::SmallInt(Some(v)) => Some(i128::from(*v)),
        Value::Int(Some(v)) => Some(i128::from(*v)),
        Value::BigInt(Some(v)) => Some(i128::from(*v)),
        Value::TinyUnsigned(Some(v)) => Some(i128::from(*v)),
        Value::SmallUnsigned(Some(v)) => Some(i128::from(*v)),
        Value::Unsigned(Some(v)) => Some(i128::from(*v)),
        Value::BigUnsigned(Some(v)) => Some(i128::from(*v)),
        Value::String(Some(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Floating view of a value.
pub fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Float(Some(v)) => Some(f64::from(*v)),
        Value::Double(Some(v)) => Some(*v),
        Value::String(Some(s)) => s.trim().parse().ok(),
        other => as_integer(other).map(|i| i as f64),
    }
}

/// Text rendering of a scalar value, if it has one.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(Some(s)) => Some(s.to_string()),
        Value::Char(Some(c)) => Some(c.to_string()),
        Value::Bool(Some(b)) => Some(b.to_string()),
        Value::Float(Some(f)) => Some(f.to_string()),
        Value::Double(Some(d)) => Some(d.to_string()),
        Value::Json(Some(j)) => Some(j.to_string()),
        other => as_integer(other).map(|i| i.to_string()),
    }
}

/// Short form of a value for statistics lines.
pub(crate) fn display(value: &Value) -> String {
    if is_null(value) {
        return "NULL".to_string();
    }
    match value {
        Value::String(Some(s)) => format!("'{s}'"),
        Value::Bytes(Some(b)) => format!("<{} bytes>", b.len()),
        other => as_text(other).unwrap_or_else(|| format!("{other:?}")),
    }
}

fn mismatch(expected: &str, value: &Value) -> QuarryError {
    QuarryError::Mapping(format!("cannot read {value:?} as {expected}"))
}

/// Conversion between a field type and a bound [`Value`].
pub trait ColumnValue: Sized {
    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self>;

    /// Typed NULL of this field type.
    fn null_value() -> Value {
        null()
    }
}

macro_rules! integer_column_value {
    ($($ty:ty),*) => {
        $(
            impl ColumnValue for $ty {
                fn to_value(&self) -> Value {
                    Value::from(*self)
                }

                fn from_value(value: Value) -> Result<Self> {
                    let wide = as_integer(&value)
                        .or_else(|| match value {
                            Value::Bool(Some(b)) => Some(i128::from(b)),
                            _ => None,
                        })
                        .ok_or_else(|| mismatch(stringify!($ty), &value))?;
                    <$ty>::try_from(wide).map_err(|_| mismatch(stringify!($ty), &value))
                }

                fn null_value() -> Value {
                    Value::from(None::<$ty>)
                }
            }
        )*
    };
}

integer_column_value!(i8, i16, i32, i64, u8, u16, u32, u64);

impl ColumnValue for f32 {
    fn to_value(&self) -> Value {
        Value::from(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        as_float(&value)
            .map(|f| f as f32)
            .ok_or_else(|| mismatch("f32", &value))
    }

    fn null_value() -> Value {
        Value::from(None::<f32>)
    }
}

impl ColumnValue for f64 {
    fn to_value(&self) -> Value {
        Value::from(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        as_float(&value).ok_or_else(|| mismatch("f64", &value))
    }

    fn null_value() -> Value {
        Value::from(None::<f64>)
    }
}

impl ColumnValue for bool {
    fn to_value(&self) -> Value {
        Value::from(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Bool(Some(b)) => Ok(*b),
            Value::String(Some(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(Some(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => as_integer(other)
                .map(|i| i != 0)
                .ok_or_else(|| mismatch("bool", &value)),
        }
    }

    fn null_value() -> Value {
        Value::from(None::<bool>)
    }
}

impl ColumnValue for String {
    fn to_value(&self) -> Value {
        Value::from(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Bytes(Some(b)) => {
                String::from_utf8(b.to_vec()).map_err(|_| mismatch("String", &value))
            }
            other => as_text(other).ok_or_else(|| mismatch("String", &value)),
        }
    }

    fn null_value() -> Value {
        Value::from(None::<String>)
    }
}

impl ColumnValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::from(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Bytes(Some(b)) => Ok(b.to_vec()),
            Value::String(Some(s)) => Ok(s.as_bytes().to_vec()),
            _ => Err(mismatch("Vec<u8>", &value)),
        }
    }

    fn null_value() -> Value {
        Value::from(None::<Vec<u8>>)
    }
}

impl ColumnValue for serde_json::Value {
    fn to_value(&self) -> Value {
        Value::from(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Json(Some(j)) => Ok(serde_json::Value::clone(j)),
            Value::String(Some(s)) => serde_json::from_str(s.as_str())
                .map_err(|e| QuarryError::Mapping(format!("invalid JSON text: {e}"))),
            _ => Err(mismatch("JSON", &value)),
        }
    }

    fn null_value() -> Value {
        Value::from(None::<serde_json::Value>)
    }
}

impl ColumnValue for chrono::NaiveDate {
    fn to_value(&self) -> Value {
        Value::from(self.format("%Y-%m-%d").to_string())
    }

    fn from_value(value: Value) -> Result<Self> {
        let text = as_text(&value).ok_or_else(|| mismatch("date", &value))?;
        chrono::NaiveDate::parse_from_str(text.get(..10).unwrap_or(&text), "%Y-%m-%d")
            .map_err(|e| QuarryError::Mapping(format!("invalid date {text:?}: {e}")))
    }

    fn null_value() -> Value {
        Value::from(None::<String>)
    }
}

impl ColumnValue for chrono::NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::from(self.format("%Y-%m-%d %H:%M:%S%.f").to_string())
    }

    fn from_value(value: Value) -> Result<Self> {
        let text = as_text(&value).ok_or_else(|| mismatch("datetime", &value))?;
        chrono::NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f")
            .or_else(|_| chrono::NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f"))
            .map_err(|e| QuarryError::Mapping(format!("invalid datetime {text:?}: {e}")))
    }

    fn null_value() -> Value {
        Value::from(None::<String>)
    }
}

impl ColumnValue for chrono::DateTime<chrono::Utc> {
    fn to_value(&self) -> Value {
        Value::from(self.to_rfc3339())
    }

    fn from_value(value: Value) -> Result<Self> {
        let text = as_text(&value).ok_or_else(|| mismatch("timestamp", &value))?;
        match chrono::DateTime::parse_from_rfc3339(&text) {
            Ok(ts) => Ok(ts.with_timezone(&chrono::Utc)),
            Err(_) => chrono::NaiveDateTime::from_value(value).map(|naive| naive.and_utc()),
        }
    }

    fn null_value() -> Value {
        Value::from(None::<String>)
    }
}

impl ColumnValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl<T: ColumnValue> ColumnValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => T::null_value(),
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        if is_null(&value) {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }

    fn null_value() -> Value {
        T::null_value()
    }
}

/// Anything that can be bound as a query parameter.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl<T: ColumnValue> IntoValue for T {
    fn into_value(self) -> Value {
        self.to_value()
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::from(self.to_string())
    }
}
