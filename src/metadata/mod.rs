//! Metadata cache.
//!
//! Table name, primary key and field/column mapping of every model type are
//! derived once from its [`ModelDescriptor`](crate::ModelDescriptor) and
//! memoized for the lifetime of the owning [`Database`](crate::Database).
//! Concurrent first accesses may compute a record twice; the first one
//! inserted wins and every caller sees that same `Arc`.

pub mod naming;

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::model::{self, JoinFieldDescriptor, Model};

/// Default primary-key column when no field carries `#[primary_key]`.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Resolved facts about one persistable field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
    pub name: &'static str,
    pub column: String,
    pub update_on_duplicate: bool,
}

/// Cached metadata record of one model type. Immutable once built.
#[derive(Debug)]
pub struct ModelMeta {
    type_name: &'static str,
    table: String,
    pk_column: String,
    pk_field: String,
    fields: Vec<FieldMeta>,
    by_column: HashMap<String, &'static str>,
    joins: &'static [JoinFieldDescriptor],
}

impl ModelMeta {
    fn build<M: Model>(prefix: &str) -> Self {
        let descriptor = M::DESCRIPTOR;
        let fields: Vec<FieldMeta> = descriptor
            .fields
            .iter()
            .map(|f| FieldMeta {
                name: f.name,
                column: f
                    .column
                    .map(str::to_string)
                    .unwrap_or_else(|| naming::snake_case(f.name)),
                update_on_duplicate: f.update_on_duplicate,
            })
            .collect();

        let by_column = fields
            .iter()
            .map(|f| (f.column.to_lowercase(), f.name))
            .collect::<HashMap<_, _>>();

        let table = match descriptor.table_name {
            Some(name) => name.to_string(),
            None => naming::table_name(prefix, descriptor.type_name),
        };

        let (pk_column, pk_field) = match descriptor
            .primary_key
            .and_then(|pk| fields.iter().find(|f| f.name == pk))
        {
            Some(field) => (field.column.clone(), field.name.to_string()),
            None => {
                let field = by_column
                    .get(DEFAULT_PRIMARY_KEY)
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| naming::camel_case(DEFAULT_PRIMARY_KEY));
                (DEFAULT_PRIMARY_KEY.to_string(), field)
            }
        };

        Self {
            type_name: descriptor.type_name,
            table,
            pk_column,
            pk_field,
            fields,
            by_column,
            joins: descriptor.joins,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key_column(&self) -> &str {
        &self.pk_column
    }

    pub fn primary_key_field(&self) -> &str {
        &self.pk_field
    }

    /// Persistable fields in declaration order.
    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn column_name(&self, field: &str) -> Option<&str> {
        self.field(field).map(|f| f.column.as_str())
    }

    /// Field mapped to a result column (case-insensitive).
    pub fn field_for_column(&self, column: &str) -> Option<&'static str> {
        self.by_column.get(&column.to_lowercase()).copied()
    }

    /// Column to field map.
    pub fn column_mapping(&self) -> HashMap<String, &'static str> {
        self.fields.iter().map(|f| (f.column.clone(), f.name)).collect()
    }

    pub fn update_on_duplicate(&self, field: &str) -> bool {
        self.field(field).is_some_and(|f| f.update_on_duplicate)
    }

    pub fn joins(&self) -> &'static [JoinFieldDescriptor] {
        self.joins
    }

    pub fn join(&self, field: &str) -> Option<&'static JoinFieldDescriptor> {
        self.joins.iter().find(|j| j.name == field)
    }
}

/// Process-lifetime cache of [`ModelMeta`] records, keyed by model type.
pub struct MetadataCache {
    prefix: String,
    entries: RwLock<HashMap<TypeId, Arc<ModelMeta>>>,
}

impl MetadataCache {
    pub fn new(table_prefix: impl Into<String>) -> Self {
        Self {
            prefix: table_prefix.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn table_prefix(&self) -> &str {
        &self.prefix
    }

    /// Metadata record of `M`, computed on first access.
    pub fn meta<M: Model>(&self) -> Arc<ModelMeta> {
        let key = TypeId::of::<M>();
        if let Some(meta) = self.entries.read().get(&key) {
            return Arc::clone(meta);
        }

        let built = Arc::new(ModelMeta::build::<M>(&self.prefix));
        log::debug!(
            "cached metadata for {}: table={} pk={}",
            built.type_name,
            built.table,
            built.pk_column
        );
        Arc::clone(self.entries.write().entry(key).or_insert(built))
    }

    pub fn table_name<M: Model>(&self) -> String {
        self.meta::<M>().table.clone()
    }

    pub fn primary_key_column<M: Model>(&self) -> String {
        self.meta::<M>().pk_column.clone()
    }

    pub fn primary_key_field<M: Model>(&self) -> String {
        self.meta::<M>().pk_field.clone()
    }

    pub fn persistable_fields<M: Model>(&self) -> Vec<FieldMeta> {
        self.meta::<M>().fields.clone()
    }

    pub fn column_mapping<M: Model>(&self) -> HashMap<String, &'static str> {
        self.meta::<M>().column_mapping()
    }

    pub fn update_on_duplicate<M: Model>(&self, field: &str) -> bool {
        self.meta::<M>().update_on_duplicate(field)
    }

    /// Column name behind a field accessor.
    pub fn resolve<M: Model>(&self, field: &str) -> Result<String> {
        self.meta::<M>()
            .column_name(field)
            .map(str::to_string)
            .ok_or_else(|| model::unknown_field(M::DESCRIPTOR.type_name, field))
    }

    /// Number of cached model types.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new("")
    }
}

impl fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataCache")
            .field("prefix", &self.prefix)
            .field("entries", &self.len())
            .finish()
    }
}
