//! Attribute parsing utilities

use syn::{Attribute, ExprLit, Field, Lit};

/// Read the string value of a `#[name = "..."]` attribute
fn name_value(attrs: &[Attribute], name: &str) -> Option<String> {
    for attr in attrs {
        if attr.path().is_ident(name) {
            if let Ok(meta) = attr.meta.require_name_value() {
                if let syn::Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) = &meta.value
                {
                    return Some(s.value());
                }
            }
        }
    }
    None
}

/// Extract table name from struct attributes
pub fn extract_table_name(attrs: &[Attribute]) -> Option<String> {
    name_value(attrs, "table_name")
}

/// Check if field has a specific attribute
pub fn has_attribute(field: &Field, attr_name: &str) -> bool {
    field.attrs.iter().any(|attr| attr.path().is_ident(attr_name))
}

/// Role a field plays in the generated model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Mapped to a column
    Persistable,
    /// Filled by join resolution after the primary fetch
    Join,
    /// Neither read nor written
    Skipped,
}

/// Column-related attributes of a field
#[derive(Debug, Default)]
pub struct ColumnAttributes {
    pub is_primary_key: bool,
    pub column_name: Option<String>,
    pub update_on_duplicate: bool,
    pub is_join: bool,
    pub is_skipped: bool,
}

impl ColumnAttributes {
    pub fn role(&self) -> FieldRole {
        if self.is_skipped {
            FieldRole::Skipped
        } else if self.is_join {
            FieldRole::Join
        } else {
            FieldRole::Persistable
        }
    }
}

/// Parse all column attributes from a field
pub fn parse_column_attributes(field: &Field) -> ColumnAttributes {
    ColumnAttributes {
        is_primary_key: has_attribute(field, "primary_key"),
        column_name: name_value(&field.attrs, "column_name"),
        update_on_duplicate: has_attribute(field, "update_on_duplicate"),
        is_join: has_attribute(field, "join"),
        is_skipped: has_attribute(field, "skip"),
    }
}
