//! Translation of repository-style search requests into engine queries.

use crate::config::ConnectionConfig;
use crate::index::document::{
    escape_principal, format_date, parse_date, path_depth, quote_phrase, PARENT_PATHS,
    PHYSICAL_DEPTH,
};
use crate::index::schema::{FieldType, Schema};
use crate::transport::QueryParams;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static SIMPLE_TERM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w+$").expect("valid simple term regex"));

const SYNTAX_CHARS: &[char] = &[
    '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\',
    '/',
];

/// Request keys that steer the search instead of naming a field.
pub const RESERVED_KEYS: &[&str] = &[
    "path",
    "facet",
    "facet_field",
    "facet.field",
    "facet.mincount",
    "fq",
    "fl",
    "sort_on",
    "sort_order",
    "sort_limit",
    "rows",
    "start",
    "b_start",
];

/// A search request in the repository's native parameter form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    params: Map<String, Value>,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object; anything else yields an empty request.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(params) => SearchRequest { params },
            _ => SearchRequest::default(),
        }
    }

    /// Add or override one parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Apply keyword overrides on top of the request, later keys winning.
    pub fn merge(mut self, overrides: &Map<String, Value>) -> Self {
        for (k, v) in overrides {
            self.params.insert(k.clone(), v.clone());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.params.iter()
    }

    /// `true` when `key` is present with a non-blank value.
    pub fn has_value(&self, key: &str) -> bool {
        self.params.get(key).map(|v| !is_blank(v)).unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.iter().all(is_blank),
        Value::Object(o) => o.get("query").map(is_blank).unwrap_or(true),
        _ => false,
    }
}

/// `true` when the request names at least one of `required`, or nothing is required.
pub fn has_required(request: &SearchRequest, required: &[String]) -> bool {
    required.is_empty() || required.iter().any(|key| request.has_value(key))
}

/// Quote `term` when the engine would otherwise parse it as syntax.
pub fn quote(term: &str) -> String {
    if term.starts_with('"') && term.ends_with('"') && term.len() > 1 {
        return term.to_string();
    }
    if term.chars().any(|c| c.is_whitespace() || SYNTAX_CHARS.contains(&c)) {
        quote_phrase(term)
    } else {
        term.to_string()
    }
}

/// Rewrite free text for a tokenized field: one plain word matches as a
/// prefix or exactly; anything else is grouped as given.
pub fn mangle_text(text: &str) -> String {
    let text = text.trim();
    if SIMPLE_TERM.is_match(text) {
        return format!("({}* OR {})", text.to_lowercase(), text);
    }
    if text.starts_with('(') && text.ends_with(')') {
        return text.to_string();
    }
    if text.starts_with('"') && text.ends_with('"') && text.len() > 1 {
        return text.to_string();
    }
    format!("({})", text)
}

/// Builds [`QueryParams`] for one schema and configuration.
pub struct QueryBuilder<'a> {
    schema: &'a Schema,
    config: &'a ConnectionConfig,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(schema: &'a Schema, config: &'a ConnectionConfig) -> Self {
        QueryBuilder { schema, config }
    }

    fn is_principal(&self, field: &str) -> bool {
        self.config.principal_fields.iter().any(|p| p == field)
    }

    fn field_type(&self, field: &str) -> FieldType {
        self.schema
            .get_field(field)
            .map(|f| f.field_type)
            .unwrap_or(FieldType::Other)
    }

    /// One scalar value as a query term for `field`; `None` drops it.
    fn term(&self, field: &str, value: &Value, free_text: bool) -> Option<String> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return None;
                }
                match self.field_type(field) {
                    FieldType::Text if free_text => Some(mangle_text(s)),
                    FieldType::Date => Some(match parse_date(s) {
                        Some(d) => quote(&format_date(&d)),
                        None => quote(s),
                    }),
                    FieldType::Boolean => Some(match s {
                        "True" | "true" | "1" | "on" => "true".to_string(),
                        "False" | "false" | "0" => "false".to_string(),
                        other => quote(other),
                    }),
                    _ if self.is_principal(field) => Some(quote(&escape_principal(s))),
                    _ => Some(quote(s)),
                }
            }
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn terms(&self, field: &str, value: &Value) -> Vec<String> {
        match value {
            Value::Array(items) => items
                .iter()
                .filter_map(|v| self.term(field, v, false))
                .collect(),
            other => self.term(field, other, false).into_iter().collect(),
        }
    }

    /// Render the engine clause for one field filter.
    pub fn clause(&self, field: &str, value: &Value) -> Option<String> {
        let expr = match value {
            Value::Object(spec) => self.structured(field, spec)?,
            Value::Array(_) => {
                let terms = self.terms(field, value);
                match terms.len() {
                    0 => return None,
                    1 => terms.into_iter().next()?,
                    _ => format!("({})", terms.join(" OR ")),
                }
            }
            other => self.term(field, other, true)?,
        };
        Some(format!("+{}:{}", field, expr))
    }

    fn structured(&self, field: &str, spec: &Map<String, Value>) -> Option<String> {
        let query = spec.get("query")?;
        if let Some(range) = spec.get("range").and_then(Value::as_str) {
            let terms = self.terms(field, query);
            return match (range, terms.as_slice()) {
                ("min", [v, ..]) => Some(format!("[{} TO *]", v)),
                ("max", [v, ..]) => Some(format!("[* TO {}]", v)),
                ("min:max", [a, b, ..]) => Some(format!("[{} TO {}]", a, b)),
                _ => {
                    tracing::warn!("[QUERY] ignoring malformed range {:?} on {}", range, field);
                    None
                }
            };
        }
        let terms = self.terms(field, query);
        if terms.is_empty() {
            return None;
        }
        let and = spec
            .get("operator")
            .and_then(Value::as_str)
            .map(|op| op.eq_ignore_ascii_case("and"))
            .unwrap_or(false);
        Some(match (terms.len(), and) {
            (1, _) => terms.into_iter().next()?,
            (_, true) => format!(
                "({})",
                terms
                    .iter()
                    .map(|t| format!("+{}", t))
                    .collect::<Vec<_>>()
                    .join(" ")
            ),
            (_, false) => format!("({})", terms.join(" OR ")),
        })
    }

    /// Clauses scoping the search to a subtree, optionally depth-limited.
    pub fn path_clauses(&self, value: &Value) -> Vec<String> {
        if !self.schema.contains(PARENT_PATHS) {
            tracing::debug!("[QUERY] schema has no {}, ignoring path", PARENT_PATHS);
            return Vec::new();
        }
        let (query, depth) = match value {
            Value::Object(spec) => (
                spec.get("query").cloned().unwrap_or(Value::Null),
                spec.get("depth").and_then(Value::as_i64),
            ),
            other => (other.clone(), None),
        };
        let paths: Vec<String> = match &query {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        let paths: Vec<String> = paths
            .iter()
            .map(|p| p.trim_end_matches('/'))
            .map(|p| if p.is_empty() { "/" } else { p })
            .map(str::to_string)
            .collect();
        if paths.is_empty() {
            return Vec::new();
        }

        let depth = match depth.filter(|d| *d >= 0) {
            Some(_) if !self.schema.contains(PHYSICAL_DEPTH) => {
                tracing::debug!("[QUERY] schema has no {}, ignoring depth", PHYSICAL_DEPTH);
                None
            }
            depth => depth,
        };
        let under = |p: &str| format!("+{}:{}", PARENT_PATHS, quote_phrase(p));

        let Some(depth) = depth else {
            if paths.len() == 1 {
                return vec![under(&paths[0])];
            }
            let quoted: Vec<String> = paths.iter().map(|p| quote_phrase(p)).collect();
            return vec![format!("+{}:({})", PARENT_PATHS, quoted.join(" OR "))];
        };

        // each path carries its own depth window
        let limited = |p: &str| {
            let base = path_depth(p);
            [
                under(p),
                format!("+{}:[{} TO {}]", PHYSICAL_DEPTH, base, base + depth),
            ]
        };
        if paths.len() == 1 {
            return limited(&paths[0]).to_vec();
        }
        let groups: Vec<String> = paths
            .iter()
            .map(|p| format!("({})", limited(p).join(" ")))
            .collect();
        vec![format!("+({})", groups.join(" OR "))]
    }

    fn sort(&self, request: &SearchRequest) -> Option<String> {
        let sort_on = request.get("sort_on").and_then(Value::as_str)?;
        let field = self
            .config
            .sort_aliases
            .get(sort_on)
            .map(String::as_str)
            .unwrap_or(sort_on);
        if !self.schema.contains(field) {
            tracing::debug!("[QUERY] ignoring sort on unknown field {}", sort_on);
            return None;
        }
        let descending = request
            .get("sort_order")
            .and_then(Value::as_str)
            .map(|o| matches!(o.to_lowercase().as_str(), "reverse" | "descending" | "desc"))
            .unwrap_or(false);
        Some(format!("{} {}", field, if descending { "desc" } else { "asc" }))
    }

    fn facet_fields(&self, request: &SearchRequest) -> Vec<String> {
        let enabled = match request.get("facet") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => matches!(s.as_str(), "true" | "True" | "on" | "1"),
            _ => false,
        };
        if !enabled {
            return Vec::new();
        }
        let mut requested: Vec<String> = Vec::new();
        for key in ["facet_field", "facet.field"] {
            match request.get(key) {
                Some(Value::String(s)) => requested.push(s.clone()),
                Some(Value::Array(items)) => requested.extend(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string),
                ),
                _ => {}
            }
        }
        if requested.is_empty() {
            requested = self.config.facets.clone();
        }
        let mut fields = Vec::new();
        for field in requested {
            if !self.schema.contains(&field) {
                tracing::debug!("[QUERY] dropping facet on unknown field {}", field);
                continue;
            }
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        fields
    }

    fn number(value: Option<&Value>) -> Option<u64> {
        match value? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Translate a whole request.
    pub fn build(&self, request: &SearchRequest) -> QueryParams {
        let mut q: Vec<String> = Vec::new();
        let mut fq: Vec<String> = Vec::new();

        if let Some(path) = request.get("path") {
            q.extend(self.path_clauses(path));
        }
        for (key, value) in request.iter() {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            if !self.schema.contains(key) {
                tracing::trace!("[QUERY] ignoring unknown parameter {}", key);
                continue;
            }
            let Some(clause) = self.clause(key, value) else {
                continue;
            };
            if self.config.filter_queries.iter().any(|f| f == key) {
                fq.push(clause);
            } else {
                q.push(clause);
            }
        }
        match request.get("fq") {
            Some(Value::String(s)) if !s.trim().is_empty() => fq.push(s.clone()),
            Some(Value::Array(items)) => fq.extend(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string),
            ),
            _ => {}
        }

        let mut params = QueryParams::new(if q.is_empty() {
            "*:*".to_string()
        } else {
            q.join(" ")
        });
        params.fq = fq;
        params.fl = request.get("fl").and_then(Value::as_str).map(str::to_string);
        params.sort = self.sort(request);
        params.start =
            Self::number(request.get("start")).or_else(|| Self::number(request.get("b_start")));
        params.rows = Self::number(request.get("rows"))
            .or_else(|| Self::number(request.get("sort_limit")))
            .map(|n| n as usize)
            .or(self.config.max_results);
        params.facet_fields = self.facet_fields(request);
        if params.is_faceted() {
            params.facet_mincount = Self::number(request.get("facet.mincount"));
        }
        params
    }
}
