use super::{CommitOptions, QueryParams, Transport, TransportFactory, UpdateDocument};
use crate::config::ConnectionConfig;
use crate::error::{IndexSyncError, Result};
use crate::index::schema::Schema;
use crate::types::{FacetCounts, ResponseHeader, SearchRecord, SearchResponse};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::sync::Arc;

/// JSON-over-HTTP session with a Solr-compatible engine.
pub struct HttpTransport {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, config: &ConnectionConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn check(operation: &str, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(IndexSyncError::Engine {
            operation: operation.to_string(),
            status,
            body,
        })
    }

    async fn post_update(&self, operation: &str, body: &Value) -> Result<()> {
        let url = format!("{}/update", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .query(&[("wt", "json")])
            .json(body)
            .send()
            .await?;
        Self::check(operation, response).await?;
        tracing::trace!("[HTTP {}] {} ok", self.base_url, operation);
        Ok(())
    }

    async fn get_json(
        &self,
        operation: &str,
        path: &str,
        pairs: &[(String, String)],
    ) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http_client
            .get(&url)
            .query(&[("wt", "json")])
            .query(pairs)
            .send()
            .await?;
        let response = Self::check(operation, response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| IndexSyncError::MalformedResponse(format!("{}: {}", operation, e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn add(&self, docs: &[UpdateDocument]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let body = Value::Array(docs.iter().cloned().map(Value::Object).collect());
        self.post_update("add", &body).await
    }

    async fn delete_by_query(&self, query: &str) -> Result<()> {
        self.post_update("delete", &json!({ "delete": { "query": query } }))
            .await
    }

    async fn commit(&self, options: CommitOptions) -> Result<()> {
        self.post_update(
            "commit",
            &json!({ "commit": { "waitSearcher": options.wait_searcher } }),
        )
        .await
    }

    async fn search(&self, params: &QueryParams) -> Result<SearchResponse> {
        let value = self.get_json("select", "select", &params.to_pairs()).await?;
        parse_select_response(&value)
    }

    async fn get_schema(&self) -> Result<Schema> {
        let value = self
            .get_json("schema", "schema", &[])
            .await
            .map_err(|e| match e {
                IndexSyncError::MalformedResponse(msg) => IndexSyncError::SchemaUnavailable(msg),
                other => other,
            })?;
        Schema::from_engine_json(&value)
    }
}

/// Opens an [`HttpTransport`] against the configured endpoint.
#[derive(Debug, Default)]
pub struct HttpTransportFactory;

#[async_trait]
impl TransportFactory for HttpTransportFactory {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Transport>> {
        let base_url = config.base_url()?;
        tracing::debug!("[HTTP] connecting to {}", base_url);
        Ok(Arc::new(HttpTransport::new(base_url, config)))
    }
}

/// Parse a `/select` reply (`responseHeader`, `response`, `facet_counts`).
pub fn parse_select_response(value: &Value) -> Result<SearchResponse> {
    let body = value
        .get("response")
        .ok_or_else(|| IndexSyncError::MalformedResponse("select: missing response".into()))?;

    let num_found = body.get("numFound").and_then(Value::as_u64).unwrap_or(0);
    let start = body.get("start").and_then(Value::as_u64).unwrap_or(0);
    let docs = body
        .get("docs")
        .and_then(Value::as_array)
        .ok_or_else(|| IndexSyncError::MalformedResponse("select: missing docs".into()))?;

    let records = docs
        .iter()
        .filter_map(Value::as_object)
        .map(|doc| {
            let mut fields: IndexMap<String, Value> = IndexMap::with_capacity(doc.len());
            let mut score = None;
            for (k, v) in doc {
                if k == "score" {
                    score = v.as_f64().map(|s| s as f32);
                } else {
                    fields.insert(k.clone(), v.clone());
                }
            }
            SearchRecord { fields, score }
        })
        .collect();

    let header = value
        .get("responseHeader")
        .map(|h| ResponseHeader {
            status: h.get("status").and_then(Value::as_i64).unwrap_or(0),
            qtime: h.get("QTime").and_then(Value::as_u64).unwrap_or(0),
            params: h
                .get("params")
                .and_then(Value::as_object)
                .map(|p| p.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default(),
        })
        .unwrap_or_default();

    let facet_counts = value
        .pointer("/facet_counts/facet_fields")
        .and_then(Value::as_object)
        .map(parse_facet_fields);

    Ok(SearchResponse {
        num_found,
        start,
        records,
        facet_counts,
        header,
    })
}

/// Facet fields arrive as flat `[value, count, value, count, ...]` lists.
fn parse_facet_fields(fields: &serde_json::Map<String, Value>) -> FacetCounts {
    let mut counts = FacetCounts::new();
    for (field, list) in fields {
        let mut values = IndexMap::new();
        if let Some(items) = list.as_array() {
            for pair in items.chunks(2) {
                if let [name, count] = pair {
                    let name = match name {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    values.insert(name, count.as_u64().unwrap_or(0));
                }
            }
        }
        counts.insert(field.clone(), values);
    }
    counts
}
