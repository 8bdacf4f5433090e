#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use indexsync::config::{ConnectionConfig, SharedConfig};
use indexsync::index::repository::is_within;
use indexsync::index::schema::{FieldType, Schema};
use indexsync::transport::{
    CommitOptions, QueryParams, Transport, TransportFactory, UpdateDocument,
};
use indexsync::types::{
    FacetCounts, FieldValue, ObjectId, ResponseHeader, SearchRecord, SearchResponse,
};
use indexsync::{ConnectionManager, Indexable, IndexSyncError, Repository};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ============================================================
// SCHEMA / CONFIG
// ============================================================

pub fn standard_schema() -> Schema {
    Schema::builder("UID")
        .field("Title", FieldType::Text)
        .field("SearchableText", FieldType::Text)
        .field("Description", FieldType::Text)
        .field("portal_type", FieldType::String)
        .field("review_state", FieldType::String)
        .multi_field("Subject", FieldType::String)
        .multi_field("allowedRolesAndUsers", FieldType::String)
        .field("physicalPath", FieldType::String)
        .multi_field("parentPaths", FieldType::String)
        .field("physicalDepth", FieldType::Integer)
        .field("modified", FieldType::Date)
        .field("effective", FieldType::Date)
        .field("price", FieldType::Float)
        .field("is_folderish", FieldType::Boolean)
        .build()
}

pub fn active_config() -> ConnectionConfig {
    ConnectionConfig {
        active: true,
        host: "localhost".into(),
        port: 8983,
        ..Default::default()
    }
}

pub fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

/// Engine, factory and an active manager wired together.
pub fn setup() -> (Arc<FakeEngine>, Arc<FakeTransportFactory>, Arc<ConnectionManager>) {
    setup_with(active_config())
}

pub fn setup_with(
    config: ConnectionConfig,
) -> (Arc<FakeEngine>, Arc<FakeTransportFactory>, Arc<ConnectionManager>) {
    let engine = FakeEngine::new(standard_schema());
    let factory = FakeTransportFactory::new(engine.clone());
    let manager = ConnectionManager::new(SharedConfig::new(config), factory.clone());
    (engine, factory, manager)
}

/// Poll `cond` until it holds or `limit` elapses.
pub async fn wait_for<F: FnMut() -> bool>(mut cond: F, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ============================================================
// FAKE ENGINE
// ============================================================

type Record = Map<String, Value>;

#[derive(Debug, Clone)]
enum Write {
    Add(Vec<UpdateDocument>),
    Delete(String),
}

/// In-memory engine speaking the transport contract.
///
/// Writes stay pending until `commit`; a commit that does not wait for the
/// searcher becomes visible only after `async_delay`.
pub struct FakeEngine {
    schema: Mutex<Schema>,
    committed: Mutex<BTreeMap<String, Record>>,
    staged: Mutex<Option<(Instant, BTreeMap<String, Record>)>>,
    pending: Mutex<Vec<Write>>,
    calls: Mutex<Vec<String>>,
    adds: Mutex<Vec<Vec<UpdateDocument>>>,
    deletes: Mutex<Vec<String>>,
    commits: Mutex<Vec<CommitOptions>>,
    searches: Mutex<Vec<QueryParams>>,
    down: AtomicBool,
    schema_broken: AtomicBool,
    reject_adds: AtomicBool,
    add_latency_ms: AtomicU64,
    async_delay_ms: AtomicU64,
}

impl FakeEngine {
    pub fn new(schema: Schema) -> Arc<Self> {
        Arc::new(FakeEngine {
            schema: Mutex::new(schema),
            committed: Mutex::new(BTreeMap::new()),
            staged: Mutex::new(None),
            pending: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            adds: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            commits: Mutex::new(Vec::new()),
            searches: Mutex::new(Vec::new()),
            down: AtomicBool::new(false),
            schema_broken: AtomicBool::new(false),
            reject_adds: AtomicBool::new(false),
            add_latency_ms: AtomicU64::new(0),
            async_delay_ms: AtomicU64::new(50),
        })
    }

    // --- fault injection ---

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_schema_broken(&self, broken: bool) {
        self.schema_broken.store(broken, Ordering::SeqCst);
    }

    pub fn set_reject_adds(&self, reject: bool) {
        self.reject_adds.store(reject, Ordering::SeqCst);
    }

    pub fn set_add_latency(&self, latency: Duration) {
        self.add_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_async_delay(&self, delay: Duration) {
        self.async_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    // --- inspection ---

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
        self.adds.lock().unwrap().clear();
        self.deletes.lock().unwrap().clear();
        self.commits.lock().unwrap().clear();
        self.searches.lock().unwrap().clear();
    }

    pub fn add_payloads(&self) -> Vec<Vec<UpdateDocument>> {
        self.adds.lock().unwrap().clone()
    }

    pub fn delete_queries(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn commit_options(&self) -> Vec<CommitOptions> {
        self.commits.lock().unwrap().clone()
    }

    pub fn last_search(&self) -> Option<QueryParams> {
        self.searches.lock().unwrap().last().cloned()
    }

    /// Records visible to searches right now.
    pub fn docs(&self) -> BTreeMap<String, Record> {
        self.promote();
        self.committed.lock().unwrap().clone()
    }

    pub fn doc(&self, id: &str) -> Option<Record> {
        self.docs().get(id).cloned()
    }

    pub fn count(&self) -> usize {
        self.docs().len()
    }

    /// Insert a record directly, as if committed earlier.
    pub fn seed(&self, record: Value) {
        let key = self.schema.lock().unwrap().unique_key().to_string();
        if let Value::Object(record) = record {
            if let Some(id) = record.get(&key).and_then(Value::as_str) {
                self.committed
                    .lock()
                    .unwrap()
                    .insert(id.to_string(), record.clone());
            }
        }
    }

    fn check_up(&self, op: &str) -> indexsync::Result<()> {
        self.calls.lock().unwrap().push(op.to_string());
        if self.down.load(Ordering::SeqCst) {
            return Err(IndexSyncError::transport(op, "connection refused"));
        }
        Ok(())
    }

    fn promote(&self) {
        let mut staged = self.staged.lock().unwrap();
        if let Some((visible_at, _)) = staged.as_ref() {
            if Instant::now() >= *visible_at {
                if let Some((_, state)) = staged.take() {
                    *self.committed.lock().unwrap() = state;
                }
            }
        }
    }

    fn apply(&self, state: &mut BTreeMap<String, Record>, writes: Vec<Write>) {
        let schema = self.schema.lock().unwrap().clone();
        let key = schema.unique_key().to_string();
        for write in writes {
            match write {
                Write::Add(docs) => {
                    for doc in docs {
                        let Some(id) = doc.get(&key).and_then(Value::as_str).map(str::to_string)
                        else {
                            continue;
                        };
                        let partial = doc
                            .values()
                            .any(|v| v.as_object().map(|o| o.contains_key("set")).unwrap_or(false));
                        if partial {
                            let record = state.entry(id.clone()).or_insert_with(|| {
                                let mut r = Record::new();
                                r.insert(key.clone(), Value::String(id.clone()));
                                r
                            });
                            for (k, v) in doc {
                                if k == key {
                                    continue;
                                }
                                match v.as_object().and_then(|o| o.get("set")) {
                                    Some(Value::Null) => {
                                        record.remove(&k);
                                    }
                                    Some(set) => {
                                        record.insert(k, set.clone());
                                    }
                                    None => {
                                        record.insert(k, v);
                                    }
                                }
                            }
                        } else {
                            state.insert(id, doc);
                        }
                    }
                }
                Write::Delete(query) => {
                    let doomed: Vec<String> = state
                        .iter()
                        .filter(|(_, r)| matches_query(&schema, r, &query))
                        .map(|(id, _)| id.clone())
                        .collect();
                    for id in doomed {
                        state.remove(&id);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Transport for FakeEngine {
    async fn add(&self, docs: &[UpdateDocument]) -> indexsync::Result<()> {
        self.check_up("add")?;
        let latency = self.add_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        self.adds.lock().unwrap().push(docs.to_vec());
        if self.reject_adds.load(Ordering::SeqCst) {
            return Err(IndexSyncError::Engine {
                operation: "add".into(),
                status: http::StatusCode::BAD_REQUEST,
                body: "document rejected".into(),
            });
        }
        self.pending.lock().unwrap().push(Write::Add(docs.to_vec()));
        Ok(())
    }

    async fn delete_by_query(&self, query: &str) -> indexsync::Result<()> {
        self.check_up("delete")?;
        self.deletes.lock().unwrap().push(query.to_string());
        self.pending
            .lock()
            .unwrap()
            .push(Write::Delete(query.to_string()));
        Ok(())
    }

    async fn commit(&self, options: CommitOptions) -> indexsync::Result<()> {
        self.check_up("commit")?;
        self.commits.lock().unwrap().push(options);
        self.promote();
        let writes = std::mem::take(&mut *self.pending.lock().unwrap());
        let mut staged = self.staged.lock().unwrap();
        let mut state = match staged.as_ref() {
            Some((_, s)) => s.clone(),
            None => self.committed.lock().unwrap().clone(),
        };
        self.apply(&mut state, writes);
        let delay = self.async_delay_ms.load(Ordering::SeqCst);
        if options.wait_searcher || delay == 0 {
            *staged = None;
            *self.committed.lock().unwrap() = state;
        } else {
            *staged = Some((Instant::now() + Duration::from_millis(delay), state));
        }
        Ok(())
    }

    async fn search(&self, params: &QueryParams) -> indexsync::Result<SearchResponse> {
        self.check_up("search")?;
        self.searches.lock().unwrap().push(params.clone());
        let schema = self.schema.lock().unwrap().clone();
        let docs = self.docs();

        let mut matched: Vec<&Record> = docs
            .values()
            .filter(|r| matches_query(&schema, r, &params.q))
            .filter(|r| params.fq.iter().all(|fq| matches_query(&schema, r, fq)))
            .collect();

        if let Some(sort) = params.sort.as_deref() {
            let mut parts = sort.split_whitespace();
            let field = parts.next().unwrap_or_default().to_string();
            let desc = parts.next() == Some("desc");
            matched.sort_by(|a, b| {
                let ord = compare_values(a.get(&field), b.get(&field));
                if desc {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        let facet_counts = if params.is_faceted() {
            let mut counts = FacetCounts::new();
            for field in &params.facet_fields {
                let mut tally: BTreeMap<String, u64> = BTreeMap::new();
                for record in &matched {
                    for v in values_of(record, field) {
                        *tally.entry(v).or_insert(0) += 1;
                    }
                }
                let mut sorted: Vec<(String, u64)> = tally.into_iter().collect();
                sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                let min = params.facet_mincount.unwrap_or(0);
                counts.insert(
                    field.clone(),
                    sorted.into_iter().filter(|(_, c)| *c >= min).collect(),
                );
            }
            Some(counts)
        } else {
            None
        };

        let num_found = matched.len() as u64;
        let start = params.start.unwrap_or(0);
        let rows = params.rows.unwrap_or(10);
        let fl: Option<Vec<String>> = params
            .fl
            .as_ref()
            .map(|fl| fl.split(',').map(|f| f.trim().to_string()).collect());
        let records = matched
            .into_iter()
            .skip(start as usize)
            .take(rows)
            .map(|r| {
                let fields: IndexMap<String, Value> = r
                    .iter()
                    .filter(|(k, _)| fl.as_ref().map(|fl| fl.contains(k)).unwrap_or(true))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                SearchRecord {
                    fields,
                    score: Some(1.0),
                }
            })
            .collect();

        Ok(SearchResponse {
            num_found,
            start,
            records,
            facet_counts,
            header: ResponseHeader {
                status: 0,
                qtime: 1,
                params: params
                    .to_pairs()
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect(),
            },
        })
    }

    async fn get_schema(&self) -> indexsync::Result<Schema> {
        self.check_up("schema")?;
        if self.schema_broken.load(Ordering::SeqCst) {
            return Err(IndexSyncError::SchemaUnavailable("schema handler failed".into()));
        }
        Ok(self.schema.lock().unwrap().clone())
    }
}

// --- mini query evaluator ---

fn split_top_level(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut depth = 0i32;
    let mut in_quotes = false;
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            cur.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                cur.push(c);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                cur.push(c);
            }
            '(' | '[' if !in_quotes => {
                depth += 1;
                cur.push(c);
            }
            ')' | ']' if !in_quotes => {
                depth -= 1;
                cur.push(c);
            }
            c if c.is_whitespace() && !in_quotes && depth == 0 => {
                if !cur.is_empty() {
                    out.push(std::mem::take(&mut cur));
                }
            }
            _ => cur.push(c),
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

fn matches_query(schema: &Schema, record: &Record, query: &str) -> bool {
    split_top_level(query)
        .iter()
        .all(|clause| matches_clause(schema, record, clause))
}

fn matches_clause(schema: &Schema, record: &Record, clause: &str) -> bool {
    let clause = clause.trim_start_matches('+');
    if clause == "*:*" {
        return true;
    }
    if clause.starts_with('(') && clause.ends_with(')') {
        let tokens = split_top_level(&clause[1..clause.len() - 1]);
        let group = |t: &String| {
            let inner = t.strip_prefix('(').and_then(|t| t.strip_suffix(')'));
            matches_query(schema, record, inner.unwrap_or(t))
        };
        if tokens.iter().any(|t| t == "OR") {
            return tokens.iter().filter(|t| *t != "OR").any(group);
        }
        return tokens.iter().all(group);
    }
    let Some((field, expr)) = clause.split_once(':') else {
        return false;
    };
    let text = schema
        .get_field(field)
        .map(|f| f.field_type == FieldType::Text)
        .unwrap_or(false);
    matches_expr(expr, &values_of(record, field), text)
}

fn matches_expr(expr: &str, values: &[String], text: bool) -> bool {
    if expr.starts_with('(') && expr.ends_with(')') {
        let tokens = split_top_level(&expr[1..expr.len() - 1]);
        if tokens.iter().any(|t| t == "OR") {
            return tokens
                .iter()
                .filter(|t| *t != "OR")
                .any(|t| matches_expr(t, values, text));
        }
        if !tokens.is_empty() && tokens.iter().all(|t| t.starts_with('+')) {
            return tokens
                .iter()
                .all(|t| matches_expr(&t[1..], values, text));
        }
        return tokens.iter().any(|t| matches_expr(t, values, text));
    }
    if expr.starts_with('[') && expr.ends_with(']') {
        let inner = &expr[1..expr.len() - 1];
        let Some((lo, hi)) = inner.split_once(" TO ") else {
            return false;
        };
        let (lo, hi) = (unquote(lo.trim()), unquote(hi.trim()));
        return values.iter().any(|v| {
            (lo == "*" || compare_str(v, &lo) != std::cmp::Ordering::Less)
                && (hi == "*" || compare_str(v, &hi) != std::cmp::Ordering::Greater)
        });
    }
    matches_term(expr, values, text)
}

fn unquote(term: &str) -> String {
    if term.len() > 1 && term.starts_with('"') && term.ends_with('"') {
        term[1..term.len() - 1]
            .replace("\\\"", "\"")
            .replace("\\\\", "\\")
    } else {
        term.to_string()
    }
}

fn tokens(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn matches_term(term: &str, values: &[String], text: bool) -> bool {
    let quoted = term.starts_with('"');
    let term = unquote(term);
    let prefix = (!quoted && term.ends_with('*')).then(|| term.trim_end_matches('*').to_string());
    values.iter().any(|v| {
        if text {
            let toks = tokens(v);
            match &prefix {
                Some(p) => {
                    let p = p.to_lowercase();
                    toks.iter().any(|t| t.starts_with(&p))
                }
                None => {
                    let wanted = tokens(&term);
                    if wanted.len() > 1 {
                        toks.windows(wanted.len()).any(|w| w == wanted.as_slice())
                    } else {
                        wanted.first().map(|w| toks.contains(w)).unwrap_or(false)
                    }
                }
            }
        } else {
            match &prefix {
                Some(p) => v.starts_with(p.as_str()),
                None => compare_str(v, &term) == std::cmp::Ordering::Equal,
            }
        }
    })
}

fn compare_str(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.cmp(b),
    }
}

fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn values_of(record: &Record, field: &str) -> Vec<String> {
    match record.get(field) {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_string).collect(),
        Some(v) => scalar_string(v).into_iter().collect(),
        None => Vec::new(),
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    let first = |v: Option<&Value>| match v {
        Some(Value::Array(items)) => items.first().and_then(scalar_string),
        Some(v) => scalar_string(v),
        None => None,
    };
    match (first(a), first(b)) {
        (Some(x), Some(y)) => compare_str(&x, &y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

// ============================================================
// FAKE TRANSPORT FACTORY
// ============================================================

pub struct FakeTransportFactory {
    engine: Arc<FakeEngine>,
    connects: AtomicUsize,
    connect_delay_ms: AtomicU64,
    refuse: AtomicBool,
}

impl FakeTransportFactory {
    pub fn new(engine: Arc<FakeEngine>) -> Arc<Self> {
        Arc::new(FakeTransportFactory {
            engine,
            connects: AtomicUsize::new(0),
            connect_delay_ms: AtomicU64::new(0),
            refuse: AtomicBool::new(false),
        })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        self.connect_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransportFactory for FakeTransportFactory {
    async fn connect(&self, _config: &ConnectionConfig) -> indexsync::Result<Arc<dyn Transport>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let delay = self.connect_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.refuse.load(Ordering::SeqCst) {
            return Err(IndexSyncError::transport("connect", "connection refused"));
        }
        Ok(self.engine.clone())
    }
}

// ============================================================
// FAKE REPOSITORY
// ============================================================

#[derive(Debug, Clone)]
pub struct FakeObject {
    pub uid: ObjectId,
    pub path: String,
    pub modified: DateTime<Utc>,
    pub fields: HashMap<String, FieldValue>,
}

impl FakeObject {
    pub fn new(uid: &str, path: &str) -> Self {
        FakeObject {
            uid: uid.to_string(),
            path: path.to_string(),
            modified: date(2010, 1, 1),
            fields: HashMap::new(),
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn modified_at(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = modified;
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.fields.insert(name.to_string(), value.into());
    }
}

impl Indexable for FakeObject {
    fn uid(&self) -> ObjectId {
        self.uid.clone()
    }

    fn path(&self) -> String {
        self.path.clone()
    }

    fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        self.fields.get(name).cloned()
    }
}

#[derive(Default)]
pub struct FakeRepository {
    objects: Mutex<BTreeMap<String, Arc<FakeObject>>>,
    vocabularies: Mutex<HashMap<String, Vec<String>>>,
}

impl FakeRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put(&self, obj: FakeObject) -> Arc<FakeObject> {
        let obj = Arc::new(obj);
        self.objects
            .lock()
            .unwrap()
            .insert(obj.uid.clone(), obj.clone());
        obj
    }

    pub fn remove(&self, uid: &str) -> Option<Arc<FakeObject>> {
        self.objects.lock().unwrap().remove(uid)
    }

    pub fn get(&self, uid: &str) -> Option<Arc<FakeObject>> {
        self.objects.lock().unwrap().get(uid).cloned()
    }

    /// Replace an object with an edited copy.
    pub fn edit<F: FnOnce(&mut FakeObject)>(&self, uid: &str, f: F) -> Option<Arc<FakeObject>> {
        let mut objects = self.objects.lock().unwrap();
        let current = objects.get(uid)?;
        let mut next = (**current).clone();
        f(&mut next);
        let next = Arc::new(next);
        objects.insert(uid.to_string(), next.clone());
        Some(next)
    }

    pub fn set_vocabulary(&self, field: &str, values: &[&str]) {
        self.vocabularies.lock().unwrap().insert(
            field.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        );
    }
}

impl Repository for FakeRepository {
    fn objects_under(&self, path: Option<&str>) -> Vec<Arc<dyn Indexable>> {
        self.objects
            .lock()
            .unwrap()
            .values()
            .filter(|o| path.map(|p| is_within(&o.path, p)).unwrap_or(true))
            .map(|o| o.clone() as Arc<dyn Indexable>)
            .collect()
    }

    fn vocabulary(&self, field: &str) -> Option<Vec<String>> {
        self.vocabularies.lock().unwrap().get(field).cloned()
    }
}

/// A small site: a root folder, a news folder with two items, and a page.
pub fn sample_site(repo: &FakeRepository) {
    repo.put(
        FakeObject::new("root", "/plone")
            .with("Title", "Plone site")
            .with("portal_type", "Folder")
            .with("review_state", "published"),
    );
    repo.put(
        FakeObject::new("news", "/plone/news")
            .with("Title", "News")
            .with("portal_type", "Folder")
            .with("review_state", "published"),
    );
    repo.put(
        FakeObject::new("news-1", "/plone/news/first")
            .with("Title", "First news")
            .with("SearchableText", "First news item about Foo")
            .with("portal_type", "News Item")
            .with("review_state", "published"),
    );
    repo.put(
        FakeObject::new("news-2", "/plone/news/second")
            .with("Title", "Second news")
            .with("SearchableText", "Second news item")
            .with("portal_type", "News Item")
            .with("review_state", "private"),
    );
    repo.put(
        FakeObject::new("about", "/plone/about")
            .with("Title", "About")
            .with("SearchableText", "About this site")
            .with("portal_type", "Document")
            .with("review_state", "published"),
    );
}
