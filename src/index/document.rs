//! Conversion of repository objects into engine update documents.

use crate::index::repository::Indexable;
use crate::index::schema::{FieldType, Schema, SchemaField};
use crate::transport::UpdateDocument;
use crate::types::FieldValue;
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::borrow::Cow;

pub const PHYSICAL_PATH: &str = "physicalPath";
pub const PARENT_PATHS: &str = "parentPaths";
pub const PHYSICAL_DEPTH: &str = "physicalDepth";
pub const MODIFIED: &str = "modified";

/// Principal values use `:` internally (`user:jdoe`), which the engine
/// treats as a field separator.
pub const PRINCIPAL_DELIMITER: char = ':';
pub const PRINCIPAL_SUBSTITUTE: char = '$';

static CONTROL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]").expect("valid control char regex"));

/// ISO-8601 UTC with millisecond precision, e.g. `1972-05-11T03:45:00.000Z`.
pub fn format_date(d: &DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Truncate to the precision dates survive a round trip through the engine with.
pub fn truncate_to_millis(d: &DateTime<Utc>) -> DateTime<Utc> {
    let millis = d.timestamp_millis();
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or(*d)
}

pub fn escape_principal(value: &str) -> String {
    value.replace(PRINCIPAL_DELIMITER, &PRINCIPAL_SUBSTITUTE.to_string())
}

pub fn unescape_principal(value: &str) -> String {
    value.replace(PRINCIPAL_SUBSTITUTE, &PRINCIPAL_DELIMITER.to_string())
}

/// Wrap `value` in double quotes for an exact-match query term.
pub fn quote_phrase(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Remove control characters the engine rejects, keeping tab, newline and CR.
pub fn strip_control_chars(text: &str) -> Cow<'_, str> {
    CONTROL_CHARS.replace_all(text, "")
}

/// Number of `/`-separated segments, counting the leading empty one.
pub fn path_depth(path: &str) -> i64 {
    path.trim_end_matches('/').split('/').count() as i64
}

/// `/`, then every ancestor of `path`, then `path` itself.
pub fn parent_paths(path: &str) -> Vec<String> {
    let mut paths = vec!["/".to_string()];
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        paths.push(current.clone());
    }
    paths
}

/// Values the indexer computes itself when the object does not supply them.
pub(crate) fn derived_value(obj: &dyn Indexable, name: &str) -> Option<FieldValue> {
    match name {
        PHYSICAL_PATH => Some(FieldValue::Text(obj.path())),
        PARENT_PATHS => Some(FieldValue::from(parent_paths(&obj.path()))),
        PHYSICAL_DEPTH => Some(FieldValue::Integer(path_depth(&obj.path()))),
        MODIFIED => Some(FieldValue::Date(obj.modified())),
        _ => None,
    }
}

fn scalar_to_json(
    field: Option<&SchemaField>,
    value: &FieldValue,
    principal: bool,
) -> Option<Value> {
    let field_type = field.map(|f| f.field_type).unwrap_or(FieldType::Other);
    let value = match (field_type, value) {
        (_, FieldValue::List(_)) => return None,
        (_, FieldValue::Date(d)) => Value::String(format_date(d)),
        (FieldType::Date, FieldValue::Text(s)) => match parse_date(s) {
            Some(d) => Value::String(format_date(&d)),
            None => Value::String(strip_control_chars(s).into_owned()),
        },
        (FieldType::Float, FieldValue::Integer(i)) => json!(*i as f64),
        (_, FieldValue::Float(f)) => {
            if !f.is_finite() {
                return None;
            }
            json!(f)
        }
        (_, FieldValue::Integer(i)) => json!(i),
        (FieldType::Boolean, FieldValue::Text(s)) => match s.as_str() {
            "true" | "True" | "1" => Value::Bool(true),
            "false" | "False" | "0" => Value::Bool(false),
            _ => Value::String(s.clone()),
        },
        (_, FieldValue::Boolean(b)) => Value::Bool(*b),
        (_, FieldValue::Text(s)) => {
            let cleaned = strip_control_chars(s);
            if principal {
                Value::String(escape_principal(&cleaned))
            } else {
                Value::String(cleaned.into_owned())
            }
        }
    };
    Some(value)
}

/// Serialize one attribute value according to its schema field.
///
/// Lists become arrays in their original order; `None` means the value has no
/// representation the engine accepts (e.g. a NaN float).
pub fn serialize_value(
    field: Option<&SchemaField>,
    value: &FieldValue,
    principal: bool,
) -> Option<Value> {
    match value {
        FieldValue::List(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(|item| scalar_to_json(field, item, principal))
                .collect(),
        )),
        scalar => {
            let v = scalar_to_json(field, scalar, principal)?;
            if field.map(|f| f.multi_valued).unwrap_or(false) {
                Some(Value::Array(vec![v]))
            } else {
                Some(v)
            }
        }
    }
}

/// Build the update payload for one object.
///
/// With `attributes == None` every schema field the object has is captured
/// and the document replaces whatever the engine holds. With a subset, only
/// those fields are sent, wrapped as `{"set": value}` so the engine merges
/// them into the existing record.
pub fn build_update(
    obj: &dyn Indexable,
    schema: &Schema,
    attributes: Option<&[String]>,
    principal_fields: &[String],
) -> UpdateDocument {
    let key = schema.unique_key();
    let mut doc = UpdateDocument::new();
    doc.insert(key.to_string(), Value::String(obj.uid()));

    let names: Vec<&str> = match attributes {
        None => schema.field_names().filter(|n| *n != key).collect(),
        Some(attrs) => attrs
            .iter()
            .map(String::as_str)
            .filter(|n| *n != key && schema.contains(n))
            .collect(),
    };
    let partial = attributes.is_some();

    for name in names {
        let Some(value) = obj.field(name).or_else(|| derived_value(obj, name)) else {
            continue;
        };
        let principal = principal_fields.iter().any(|p| p == name);
        let Some(json_value) = serialize_value(schema.get_field(name), &value, principal) else {
            tracing::debug!("[INDEX] dropping unrepresentable value for {}", name);
            continue;
        };
        if partial {
            doc.insert(name.to_string(), json!({ "set": json_value }));
        } else {
            doc.insert(name.to_string(), json_value);
        }
    }
    doc
}
