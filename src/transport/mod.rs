//! Engine transport primitives.
//!
//! A [`Transport`] is one session with the engine. The crate never talks to
//! the network except through this trait, so hosts can plug in their own
//! client; [`http::HttpTransport`] is the bundled implementation.

pub mod http;

use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::index::schema::Schema;
use crate::types::SearchResponse;
use async_trait::async_trait;
use std::sync::Arc;

/// One serialized add/update payload, in the engine's JSON update format.
pub type UpdateDocument = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOptions {
    /// Block until the engine has opened a searcher that sees the commit.
    pub wait_searcher: bool,
}

impl Default for CommitOptions {
    fn default() -> Self {
        CommitOptions {
            wait_searcher: true,
        }
    }
}

/// Engine query parameters, already translated to engine syntax.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pub q: String,
    pub fq: Vec<String>,
    pub fl: Option<String>,
    pub sort: Option<String>,
    pub start: Option<u64>,
    pub rows: Option<usize>,
    pub facet_fields: Vec<String>,
    pub facet_mincount: Option<u64>,
}

impl QueryParams {
    pub fn new(q: impl Into<String>) -> Self {
        QueryParams {
            q: q.into(),
            ..Default::default()
        }
    }

    pub fn with_fields(mut self, fl: impl Into<String>) -> Self {
        self.fl = Some(fl.into());
        self
    }

    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn with_start(mut self, start: u64) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn with_filter(mut self, fq: impl Into<String>) -> Self {
        self.fq.push(fq.into());
        self
    }

    pub fn is_faceted(&self) -> bool {
        !self.facet_fields.is_empty()
    }

    /// Flatten into `key=value` pairs in the order the engine echoes them.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("q".to_string(), self.q.clone())];
        for fq in &self.fq {
            pairs.push(("fq".to_string(), fq.clone()));
        }
        if let Some(ref fl) = self.fl {
            pairs.push(("fl".to_string(), fl.clone()));
        }
        if let Some(ref sort) = self.sort {
            pairs.push(("sort".to_string(), sort.clone()));
        }
        if let Some(start) = self.start {
            pairs.push(("start".to_string(), start.to_string()));
        }
        if let Some(rows) = self.rows {
            pairs.push(("rows".to_string(), rows.to_string()));
        }
        if self.is_faceted() {
            pairs.push(("facet".to_string(), "true".to_string()));
            for field in &self.facet_fields {
                pairs.push(("facet.field".to_string(), field.clone()));
            }
            if let Some(mincount) = self.facet_mincount {
                pairs.push(("facet.mincount".to_string(), mincount.to_string()));
            }
        }
        pairs
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn add(&self, docs: &[UpdateDocument]) -> Result<()>;

    async fn delete_by_query(&self, query: &str) -> Result<()>;

    async fn commit(&self, options: CommitOptions) -> Result<()>;

    async fn search(&self, params: &QueryParams) -> Result<SearchResponse>;

    async fn get_schema(&self) -> Result<Schema>;
}

/// Opens transports for a given configuration.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Transport>>;
}
