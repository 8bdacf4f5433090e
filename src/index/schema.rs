use crate::error::{IndexSyncError, Result};
use indexmap::IndexMap;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Tokenized full-text field.
    Text,
    /// Untokenized string, matched exactly.
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Other,
}

impl FieldType {
    /// Map an engine field-type class (e.g. `solr.TrieDateField`) to a [`FieldType`].
    pub fn from_class(class: &str) -> Self {
        let class = class.rsplit('.').next().unwrap_or(class);
        if class.contains("Text") {
            FieldType::Text
        } else if class.contains("Str") {
            FieldType::String
        } else if class.contains("Date") {
            FieldType::Date
        } else if class.contains("Bool") {
            FieldType::Boolean
        } else if class.contains("Float") || class.contains("Double") {
            FieldType::Float
        } else if class.contains("Int") || class.contains("Long") {
            FieldType::Integer
        } else {
            FieldType::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    pub name: String,
    pub field_type: FieldType,
    pub multi_valued: bool,
    pub indexed: bool,
    pub stored: bool,
    pub default: Option<String>,
}

/// Immutable snapshot of the engine schema.
///
/// Fetched once per connection and shared as `Arc<Schema>`; a refetch builds
/// a new value instead of mutating this one.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    unique_key: String,
    fields: IndexMap<String, SchemaField>,
}

impl Schema {
    pub fn builder(unique_key: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(unique_key)
    }

    pub fn unique_key(&self) -> &str {
        &self.unique_key
    }

    pub fn get_field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &SchemaField> {
        self.fields.values()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse the engine's schema API reply (`{"schema": {...}}` or the inner object).
    pub fn from_engine_json(value: &Value) -> Result<Self> {
        let root = value.get("schema").unwrap_or(value);
        let malformed = |msg: &str| IndexSyncError::MalformedResponse(format!("schema: {}", msg));

        let unique_key = root
            .get("uniqueKey")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("missing uniqueKey"))?;

        let mut builder = SchemaBuilder::new(unique_key);

        let mut types: IndexMap<&str, (FieldType, Option<bool>, Option<bool>, Option<bool>)> =
            IndexMap::new();
        if let Some(field_types) = root.get("fieldTypes").and_then(Value::as_array) {
            for ft in field_types {
                let (Some(name), Some(class)) = (
                    ft.get("name").and_then(Value::as_str),
                    ft.get("class").and_then(Value::as_str),
                ) else {
                    continue;
                };
                types.insert(
                    name,
                    (
                        FieldType::from_class(class),
                        ft.get("multiValued").and_then(Value::as_bool),
                        ft.get("indexed").and_then(Value::as_bool),
                        ft.get("stored").and_then(Value::as_bool),
                    ),
                );
            }
        }

        let fields = root
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| malformed("missing fields"))?;
        for field in fields {
            let name = field
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("field without name"))?;
            let type_name = field.get("type").and_then(Value::as_str).unwrap_or("");
            let (field_type, type_multi, type_indexed, type_stored) = types
                .get(type_name)
                .copied()
                .unwrap_or((FieldType::from_class(type_name), None, None, None));
            let flag = |key: &str, inherited: Option<bool>, default: bool| {
                field
                    .get(key)
                    .and_then(Value::as_bool)
                    .or(inherited)
                    .unwrap_or(default)
            };
            builder = builder.add(SchemaField {
                name: name.to_string(),
                field_type,
                multi_valued: flag("multiValued", type_multi, false),
                indexed: flag("indexed", type_indexed, true),
                stored: flag("stored", type_stored, true),
                default: field.get("default").map(|d| match d {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }),
            });
        }

        let schema = builder.build();
        if !schema.contains(schema.unique_key()) {
            return Err(malformed("uniqueKey is not a declared field"));
        }
        Ok(schema)
    }
}

pub struct SchemaBuilder {
    unique_key: String,
    fields: IndexMap<String, SchemaField>,
}

impl SchemaBuilder {
    pub fn new(unique_key: impl Into<String>) -> Self {
        SchemaBuilder {
            unique_key: unique_key.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn add(mut self, field: SchemaField) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.add(SchemaField {
            name: name.into(),
            field_type,
            multi_valued: false,
            indexed: true,
            stored: true,
            default: None,
        })
    }

    pub fn multi_field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.add(SchemaField {
            name: name.into(),
            field_type,
            multi_valued: true,
            indexed: true,
            stored: true,
            default: None,
        })
    }

    pub fn build(mut self) -> Schema {
        if !self.fields.contains_key(&self.unique_key) {
            let key = self.unique_key.clone();
            self = self.field(key, FieldType::String);
        }
        Schema {
            unique_key: self.unique_key,
            fields: self.fields,
        }
    }
}
