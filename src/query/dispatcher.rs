use super::builder::{has_required, QueryBuilder, SearchRequest};
use super::facets::add_zero_counts;
use crate::error::{IndexSyncError, Result};
use crate::index::manager::{ConnectionManager, ContextId};
use crate::index::repository::Repository;
use crate::transport::QueryParams;
use crate::types::SearchResponse;
use std::sync::Arc;

/// Why a request has to be answered by the repository's own query engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallBackReason {
    MissingRequiredParameters,
    Inactive,
    SchemaUnavailable,
    EngineUnreachable,
}

impl std::fmt::Display for FallBackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FallBackReason::MissingRequiredParameters => "missing required parameters",
            FallBackReason::Inactive => "engine integration inactive",
            FallBackReason::SchemaUnavailable => "schema unavailable",
            FallBackReason::EngineUnreachable => "engine unreachable",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Handled(SearchResponse),
    FallBack(FallBackReason),
}

impl SearchOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, SearchOutcome::Handled(_))
    }

    pub fn response(&self) -> Option<&SearchResponse> {
        match self {
            SearchOutcome::Handled(r) => Some(r),
            SearchOutcome::FallBack(_) => None,
        }
    }

    pub fn into_response(self) -> Option<SearchResponse> {
        match self {
            SearchOutcome::Handled(r) => Some(r),
            SearchOutcome::FallBack(_) => None,
        }
    }

    pub fn fall_back_reason(&self) -> Option<FallBackReason> {
        match self {
            SearchOutcome::Handled(_) => None,
            SearchOutcome::FallBack(reason) => Some(*reason),
        }
    }
}

/// Decides per request whether the engine answers it, and runs it if so.
pub struct SearchDispatcher {
    manager: Arc<ConnectionManager>,
    vocabularies: Option<Arc<dyn Repository>>,
}

impl SearchDispatcher {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        SearchDispatcher {
            manager,
            vocabularies: None,
        }
    }

    /// Source of facet vocabularies used to report zero counts.
    pub fn with_vocabularies(mut self, repository: Arc<dyn Repository>) -> Self {
        self.vocabularies = Some(repository);
        self
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Translate `request` without running it; `Err` carries the fallback reason.
    pub async fn prepare(
        &self,
        ctx: ContextId,
        request: &SearchRequest,
    ) -> std::result::Result<QueryParams, FallBackReason> {
        let config = self.manager.config().snapshot();
        if !config.active {
            return Err(FallBackReason::Inactive);
        }
        if !has_required(request, &config.required) {
            tracing::debug!(
                "[SEARCH {}] none of {:?} given, falling back",
                ctx,
                config.required
            );
            return Err(FallBackReason::MissingRequiredParameters);
        }
        let schema = match self.manager.get_connection(ctx).await {
            Ok(_) => self.manager.get_schema(ctx).await,
            Err(IndexSyncError::Inactive) => return Err(FallBackReason::Inactive),
            Err(e) => {
                tracing::warn!("[SEARCH {}] engine unreachable: {}", ctx, e);
                return Err(FallBackReason::EngineUnreachable);
            }
        };
        let Some(schema) = schema else {
            return Err(FallBackReason::SchemaUnavailable);
        };
        Ok(QueryBuilder::new(&schema, &config).build(request))
    }

    pub async fn search(&self, ctx: ContextId, request: &SearchRequest) -> SearchOutcome {
        let params = match self.prepare(ctx, request).await {
            Ok(params) => params,
            Err(reason) => return SearchOutcome::FallBack(reason),
        };
        tracing::debug!("[SEARCH {}] q={} fq={:?}", ctx, params.q, params.fq);

        let mut response = match self.raw_search(ctx, &params).await {
            Ok(response) => response,
            Err(IndexSyncError::Inactive) => {
                return SearchOutcome::FallBack(FallBackReason::Inactive)
            }
            Err(e) => {
                tracing::error!("[SEARCH {}] exception during search: {}", ctx, e);
                return SearchOutcome::FallBack(FallBackReason::EngineUnreachable);
            }
        };

        if params.is_faceted() {
            let counts = response.facet_counts.get_or_insert_with(Default::default);
            add_zero_counts(counts, &params.facet_fields, |field| {
                self.vocabularies.as_ref().and_then(|r| r.vocabulary(field))
            });
        }
        SearchOutcome::Handled(response)
    }

    /// Run an already-translated query through `ctx`'s connection.
    pub async fn raw_search(&self, ctx: ContextId, params: &QueryParams) -> Result<SearchResponse> {
        let conn = self.manager.get_connection(ctx).await?;
        let timeout = self.manager.config().snapshot().search_timeout();
        conn.search(params, timeout).await
    }
}
