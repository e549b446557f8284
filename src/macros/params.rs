/// Build a `Vec<Value>` of bound parameters from mixed Rust values.
///
/// Every argument goes through [`IntoValue`](crate::IntoValue), so strings,
/// numbers, options and typed values can be mixed freely.
///
/// # Example
/// ```no_run
/// # fn run(db: &quarry::Database) -> quarry::Result<()> {
/// let names: Vec<String> = db
///     .by_sql("SELECT name FROM categories WHERE id > ? AND name LIKE ?", quarry::params![10, "b%"])
///     .all()?;
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::IntoValue::into_value($value)),+]
    };
}
