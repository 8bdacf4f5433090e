use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Unique identifier of a repository object (the schema's unique key value).
pub type ObjectId = String;

/// Facet counts keyed by field, each an ordered value → count mapping.
pub type FacetCounts = IndexMap<String, IndexMap<String, u64>>;

/// A dynamically-typed attribute value captured from a repository object.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FieldValue::List(_))
    }

    /// Lossy string form used for metadata keys and query terms.
    pub fn to_key_string(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::Date(d) => crate::index::document::format_date(d),
            FieldValue::List(items) => items
                .iter()
                .map(FieldValue::to_key_string)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(d: DateTime<Utc>) -> Self {
        FieldValue::Date(d)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// A single record returned by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub fields: IndexMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl SearchRecord {
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|v| v.as_str())
    }
}

/// Response metadata echoed by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub status: i64,
    #[serde(rename = "QTime")]
    pub qtime: u64,
    #[serde(default)]
    pub params: IndexMap<String, serde_json::Value>,
}

/// Parsed engine reply to a search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub num_found: u64,
    pub start: u64,
    pub records: Vec<SearchRecord>,
    pub facet_counts: Option<FacetCounts>,
    pub header: ResponseHeader,
}

impl SearchResponse {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SearchRecord> {
        self.records.iter()
    }

    /// Facet counts for one field, if the engine returned any.
    pub fn facet(&self, field: &str) -> Option<&IndexMap<String, u64>> {
        self.facet_counts.as_ref().and_then(|f| f.get(field))
    }

    /// Values of one field across all records, in result order.
    pub fn column(&self, field: &str) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|r| r.get_str(field).map(str::to_string))
            .collect()
    }
}

/// Objects out of sync between the repository and the index, for one subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub to_index: Vec<ObjectId>,
    pub to_reindex: Vec<ObjectId>,
    pub to_unindex: Vec<ObjectId>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.to_index.is_empty() && self.to_reindex.is_empty() && self.to_unindex.is_empty()
    }

    pub fn total(&self) -> usize {
        self.to_index.len() + self.to_reindex.len() + self.to_unindex.len()
    }
}
