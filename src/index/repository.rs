//! The primary object repository, as seen by the indexer.

use crate::types::{FieldValue, ObjectId};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// An object that can be written to the index.
pub trait Indexable: Send + Sync {
    fn uid(&self) -> ObjectId;

    /// Slash-separated location in the object hierarchy, e.g. `/plone/news`.
    fn path(&self) -> String;

    fn modified(&self) -> DateTime<Utc>;

    /// Attribute value by index field name; `None` when the object has no such attribute.
    fn field(&self, name: &str) -> Option<FieldValue>;
}

pub trait Repository: Send + Sync {
    /// All objects at or below `path` (the whole repository for `None`).
    fn objects_under(&self, path: Option<&str>) -> Vec<Arc<dyn Indexable>>;

    /// Every valid value of a facet field, if the repository knows the range.
    fn vocabulary(&self, _field: &str) -> Option<Vec<String>> {
        None
    }
}

/// `true` if `path` is `root` itself or lies below it.
pub fn is_within(path: &str, root: &str) -> bool {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        return true;
    }
    path == root
        || path
            .strip_prefix(root)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}
