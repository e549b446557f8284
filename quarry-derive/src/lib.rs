//! Procedural macros for quarry
//!
//! This crate provides the `Model` derive used by the query builder.

mod attributes;
mod macros;
mod utils;

use proc_macro::TokenStream;

/// Derive macro for `Model` - generates the descriptor table and accessors of a model
///
/// This macro generates:
/// - `Model` implementation with a static `ModelDescriptor` (table override,
///   primary key, persistable fields, join destinations)
/// - `get`/`set` accessors that dispatch on the field name
/// - `set_joined` for fields marked `#[join]`
/// - `FromRow` implementation (best-effort column to field mapping)
/// - One `Col<Self>` constant per persistable field (`Model::FIELD_NAME`)
///
/// Supported attributes:
/// - `#[table_name = "..."]` on the struct
/// - `#[primary_key]`, `#[column_name = "..."]`, `#[update_on_duplicate]`,
///   `#[skip]`, `#[join]` on fields
///
/// # Example
///
/// ```ignore
/// use quarry::Model;
///
/// #[derive(Debug, Default, Model)]
/// pub struct Category {
///     #[primary_key]
///     pub id: Option<i64>,
///     #[update_on_duplicate]
///     pub name: String,
///     #[column_name = "descr"]
///     pub description: Option<String>,
///     #[skip]
///     pub scratch: u32,
/// }
/// ```
#[proc_macro_derive(
    Model,
    attributes(table_name, primary_key, column_name, update_on_duplicate, skip, join)
)]
pub fn derive_model(input: TokenStream) -> TokenStream {
    macros::derive_model(input)
}
