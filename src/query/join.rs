//! Post-fetch joins.
//!
//! A [`JoinParam`] fills a `#[join]` field of each fetched model with rows of
//! another model: `SELECT * FROM <target> WHERE <on_right> = ?`, bound to the
//! model's `on_left` value. One point query is issued per fetched row and per
//! join; there is no batching.

use std::fmt;
use std::sync::Arc;

use crate::backend::Connection;
use crate::database::Database;
use crate::error::{codes, QuarryError, Result};
use crate::metadata::{MetadataCache, ModelMeta};
use crate::model::{Col, JoinShape, Model};
use crate::query::execution;
use crate::query::{OrderBy, Query};
use crate::value;

/// Names a field, either as a string or through a typed column constant.
pub trait FieldRef {
    fn field_name(&self) -> String;
}

impl FieldRef for &str {
    fn field_name(&self) -> String {
        (*self).to_string()
    }
}

impl FieldRef for String {
    fn field_name(&self) -> String {
        self.clone()
    }
}

impl<M> FieldRef for Col<M> {
    fn field_name(&self) -> String {
        self.field().to_string()
    }
}

/// Declaration of one post-fetch join.
///
/// ```no_run
/// # use quarry::{Database, JoinParam, Model, OrderBy};
/// # #[derive(Debug, Default, Model)]
/// # struct Article { #[primary_key] id: Option<i64>, author_id: Option<i64>,
/// #     #[join] comments: Vec<Comment>, #[join] author: Option<Author> }
/// # #[derive(Debug, Default, Model)]
/// # struct Comment { #[primary_key] id: Option<i64>, article_id: Option<i64> }
/// # #[derive(Debug, Default, Model)]
/// # struct Author { #[primary_key] id: Option<i64> }
/// # fn run(db: &Database) -> quarry::Result<()> {
/// let articles = db
///     .query::<Article>()
///     .join(
///         JoinParam::of::<Comment>()
///             .as_field("comments")
///             .on(Article::ID, Comment::ARTICLE_ID)
///             .order_by(Comment::ID, OrderBy::Asc),
///     )
///     .join(JoinParam::of::<Author>().as_field("author").on(Article::AUTHOR_ID, Author::ID))
///     .all()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct JoinParam {
    target: &'static str,
    target_meta: fn(&MetadataCache) -> Arc<ModelMeta>,
    field: Option<String>,
    on_left: Option<String>,
    on_right: Option<String>,
    order_by: Option<String>,
}

fn meta_of<T: Model>(cache: &MetadataCache) -> Arc<ModelMeta> {
    cache.meta::<T>()
}

impl JoinParam {
    /// Join rows of `T`.
    pub fn of<T: Model>() -> Self {
        Self {
            target: T::DESCRIPTOR.type_name,
            target_meta: meta_of::<T>,
            field: None,
            on_left: None,
            on_right: None,
            order_by: None,
        }
    }

    /// Destination `#[join]` field on the queried model.
    pub fn as_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    /// `left` is a field of the queried model, `right` a field or column of the target.
    pub fn on(mut self, left: impl FieldRef, right: impl FieldRef) -> Self {
        self.on_left = Some(left.field_name());
        self.on_right = Some(right.field_name());
        self
    }

    /// Raw ordering of the joined rows, applied to one-to-many joins.
    pub fn order(mut self, order: &str) -> Self {
        self.order_by = Some(order.to_string());
        self
    }

    pub fn order_by(mut self, right: impl FieldRef, direction: OrderBy) -> Self {
        self.order_by = Some(format!("{} {direction}", right.field_name()));
        self
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    /// Check the declaration against the queried model's descriptor.
    pub(crate) fn validate(&self, source: &ModelMeta) -> Result<()> {
        let invalid = |message: String| QuarryError::configuration(codes::INVALID_JOIN, message);
        let field = self
            .field
            .as_deref()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| invalid(format!("join on {} has no destination field", self.target)))?;
        if source.join(field).is_none() {
            return Err(crate::model::invalid_join(source.type_name(), field));
        }
        let left = self
            .on_left
            .as_deref()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| invalid(format!("join into {field} has no left-hand field")))?;
        if left_field(source, left).is_none() {
            return Err(invalid(format!(
                "{} has no persistable field `{left}` to join on",
                source.type_name()
            )));
        }
        if self.on_right.as_deref().is_none_or(str::is_empty) {
            return Err(invalid(format!("join into {field} has no right-hand column")));
        }
        Ok(())
    }

    fn point_query(&self, target: &ModelMeta, shape: JoinShape) -> String {
        let right = self.on_right.as_deref().unwrap_or_default();
        let right = target.column_name(right).unwrap_or(right);
        let mut sql = format!("SELECT * FROM {} WHERE {right} = ?", target.table());
        if shape == JoinShape::Many {
            if let Some(order) = self.order_by.as_deref().filter(|o| !o.trim().is_empty()) {
                sql.push_str(" ORDER BY ");
                sql.push_str(&order_columns(target, order));
            }
        }
        sql
    }
}

impl fmt::Debug for JoinParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinParam")
            .field("target", &self.target)
            .field("field", &self.field)
            .field("on_left", &self.on_left)
            .field("on_right", &self.on_right)
            .field("order_by", &self.order_by)
            .finish()
    }
}

/// Field of `source` named directly or through its column.
fn left_field(source: &ModelMeta, name: &str) -> Option<&'static str> {
    source
        .field(name)
        .map(|f| f.name)
        .or_else(|| source.field_for_column(name))
}

/// `"field DIR"` with the field mapped to its column when it is one.
fn order_columns(target: &ModelMeta, order: &str) -> String {
    let mut parts = order.trim().splitn(2, ' ');
    let head = parts.next().unwrap_or_default();
    let rest = parts.next();
    let column = target.column_name(head).unwrap_or(head);
    match rest {
        Some(rest) => format!("{column} {rest}"),
        None => column.to_string(),
    }
}

impl<M: Model> Query<'_, M> {
    /// Declare a post-fetch join; an invalid declaration fails the next terminal call.
    pub fn join(mut self, join: JoinParam) -> Self {
        match join.validate(&self.meta) {
            Ok(()) => self.state.joins.push(join),
            Err(err) => self.state.defer(err),
        }
        self
    }
}

/// Fill every declared join on every model.
pub(crate) fn resolve<M: Model>(
    db: &Database,
    conn: &dyn Connection,
    source: &ModelMeta,
    joins: &[JoinParam],
    models: &mut [M],
) -> Result<()> {
    if joins.is_empty() || models.is_empty() {
        return Ok(());
    }
    let cache = db.metadata();
    for join in joins {
        let (Some(field), Some(left)) = (join.field.as_deref(), join.on_left.as_deref()) else {
            continue;
        };
        let Some(descriptor) = source.join(field) else {
            continue;
        };
        let Some(left) = left_field(source, left) else {
            continue;
        };
        let target = (join.target_meta)(cache);
        let sql = join.point_query(&target, descriptor.shape);
        log::trace!(
            "resolving {}.{field} from {} for {} row(s)",
            source.type_name(),
            target.table(),
            models.len()
        );

        for model in models.iter_mut() {
            let rows = match model.get(left) {
                Some(key) if !value::is_null(&key) => execution::fetch(db, conn, &sql, &[key])?,
                _ => Vec::new(),
            };
            model.set_joined(field, rows, cache)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_ref() {
        assert_eq!("author_id".field_name(), "author_id");
        assert_eq!(String::from("x").field_name(), "x");
    }
}
