//! Bulk maintenance: diffing the repository against the index and repairing it.

use super::document::{
    derived_value, parse_date, quote_phrase, truncate_to_millis, MODIFIED, PARENT_PATHS,
};
use super::manager::{ConnectionManager, ContextScope};
use super::repository::{Indexable, Repository};
use super::write_queue::{FlushOutcome, IndexQueueProcessor};
use crate::error::{IndexSyncError, Result};
use crate::index::schema::Schema;
use crate::transport::{CommitOptions, QueryParams};
use crate::types::{DiffResult, FieldValue, ObjectId};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Rows fetched per page when listing index contents.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Objects indexed between intermediate commits during bulk reindexing.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Runs maintenance in its own execution context, so its connection and
/// queue never mix with interactive traffic.
pub struct ReconciliationEngine {
    scope: ContextScope,
    repository: Arc<dyn Repository>,
    processor: IndexQueueProcessor,
    page_size: usize,
    batch_size: usize,
}

impl ReconciliationEngine {
    pub fn new(manager: &Arc<ConnectionManager>, repository: Arc<dyn Repository>) -> Self {
        let scope = manager.enter();
        let processor = IndexQueueProcessor::for_scope(&scope);
        ReconciliationEngine {
            scope,
            repository,
            processor,
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn manager(&self) -> &Arc<ConnectionManager> {
        self.scope.manager()
    }

    async fn schema(&self) -> Result<Arc<Schema>> {
        if !self.manager().config().snapshot().active {
            return Err(IndexSyncError::Inactive);
        }
        self.manager()
            .get_schema(self.scope.id())
            .await
            .ok_or_else(|| {
                IndexSyncError::SchemaUnavailable("engine schema could not be loaded".into())
            })
    }

    /// Unique id and modification time of every record in the index under `path`.
    async fn index_state(
        &self,
        schema: &Schema,
        path: Option<&str>,
    ) -> Result<HashMap<ObjectId, Option<DateTime<Utc>>>> {
        let key = schema.unique_key();
        let q = match path.map(|p| p.trim_end_matches('/')) {
            Some(p) if !p.is_empty() => {
                if !schema.contains(PARENT_PATHS) {
                    return Err(IndexSyncError::InvalidParameter {
                        name: "path".into(),
                        message: format!("schema has no {} field", PARENT_PATHS),
                    });
                }
                format!("+{}:{}", PARENT_PATHS, quote_phrase(p))
            }
            _ => "*:*".to_string(),
        };
        let conn = self.manager().get_connection(self.scope.id()).await?;
        let timeout = self.manager().config().snapshot().search_timeout();

        let mut state = HashMap::new();
        let mut start = 0u64;
        loop {
            let params = QueryParams::new(q.clone())
                .with_fields(format!("{},{}", key, MODIFIED))
                .with_start(start)
                .with_rows(self.page_size);
            let page = conn.search(&params, timeout).await?;
            for record in page.iter() {
                let Some(id) = record.get_str(key) else {
                    continue;
                };
                let modified = record
                    .get_str(MODIFIED)
                    .and_then(parse_date)
                    .map(|d| truncate_to_millis(&d));
                state.insert(id.to_string(), modified);
            }
            start += page.len() as u64;
            if page.is_empty() || start >= page.num_found {
                break;
            }
        }
        tracing::debug!("[SYNC] index holds {} records under {:?}", state.len(), path);
        Ok(state)
    }

    fn repository_objects(&self, path: Option<&str>) -> BTreeMap<ObjectId, Arc<dyn Indexable>> {
        self.repository
            .objects_under(path)
            .into_iter()
            .map(|obj| (obj.uid(), obj))
            .filter(|(uid, _)| !uid.is_empty())
            .collect()
    }

    /// Compare repository and index under `path` (everything for `None`).
    pub async fn diff(&self, path: Option<&str>) -> Result<DiffResult> {
        let schema = self.schema().await?;
        let indexed = self.index_state(&schema, path).await?;
        let objects = self.repository_objects(path);
        Ok(compute_diff(&objects, &indexed))
    }

    async fn run_bulk<'a, I>(&mut self, objects: I, attributes: Option<&[String]>) -> Result<usize>
    where
        I: IntoIterator<Item = &'a Arc<dyn Indexable>>,
    {
        let previous = self.processor.set_index_timeout_disabled(true);
        let mut count = 0;
        let mut failures = 0;
        for obj in objects {
            self.processor.index(obj.as_ref(), attributes).await;
            count += 1;
            if self.processor.len() >= self.batch_size {
                failures += flush_failures(self.processor.commit().await);
            }
        }
        failures += flush_failures(self.processor.commit().await);
        self.processor.set_index_timeout_disabled(previous);
        if failures > 0 {
            tracing::warn!("[SYNC] bulk run finished with {} failed requests", failures);
        }
        Ok(count)
    }

    /// Reindex every object under `path`; `Some(attributes)` limits the update
    /// to those fields. Returns the number of objects processed.
    pub async fn reindex(
        &mut self,
        attributes: Option<&[String]>,
        path: Option<&str>,
    ) -> Result<usize> {
        self.schema().await?;
        let objects = self.repository_objects(path);
        tracing::info!("[SYNC] reindexing {} objects under {:?}", objects.len(), path);
        let count = self.run_bulk(objects.values(), attributes).await?;
        tracing::info!("[SYNC] reindexed {} objects", count);
        Ok(count)
    }

    /// Refresh a single metadata field across the whole repository.
    pub async fn catalog_sync(&mut self, index: &str) -> Result<usize> {
        let schema = self.schema().await?;
        if !schema.contains(index) {
            return Err(IndexSyncError::InvalidParameter {
                name: index.to_string(),
                message: "not a field of the engine schema".into(),
            });
        }
        let attributes = [index.to_string()];
        self.reindex(Some(&attributes), None).await
    }

    /// Bring the index in line with the repository under `path`.
    pub async fn sync(&mut self, path: Option<&str>) -> Result<DiffResult> {
        let diff = self.diff(path).await?;
        if diff.is_empty() {
            tracing::info!("[SYNC] index already in sync under {:?}", path);
            return Ok(diff);
        }
        let objects = self.repository_objects(path);
        let changed: Vec<&Arc<dyn Indexable>> = diff
            .to_index
            .iter()
            .chain(diff.to_reindex.iter())
            .filter_map(|uid| objects.get(uid))
            .collect();
        let previous = self.processor.set_index_timeout_disabled(true);
        self.run_bulk(changed, None).await?;
        for uid in &diff.to_unindex {
            self.processor.unindex_id(uid.clone()).await;
        }
        flush_failures(self.processor.commit().await);
        self.processor.set_index_timeout_disabled(previous);
        tracing::info!(
            "[SYNC] indexed {}, reindexed {}, unindexed {}",
            diff.to_index.len(),
            diff.to_reindex.len(),
            diff.to_unindex.len()
        );
        Ok(diff)
    }

    /// Delete every record from the index.
    pub async fn clear(&mut self) -> Result<()> {
        self.schema().await?;
        self.processor.abort();
        let conn = self.manager().get_connection(self.scope.id()).await?;
        conn.delete_by_query("*:*", None).await?;
        conn.commit(CommitOptions::default(), None).await?;
        tracing::info!("[SYNC] cleared index at {}", conn.base_url());
        Ok(())
    }

    /// Map each object's `key` value (its unique id for `None`) to its
    /// `field` value, as the repository currently holds them.
    pub fn metadata(
        &self,
        field: &str,
        key: Option<&str>,
        path: Option<&str>,
    ) -> IndexMap<String, FieldValue> {
        let mut values = IndexMap::new();
        for (uid, obj) in self.repository_objects(path) {
            let key_value = match key {
                None => uid,
                Some(k) => match obj.field(k).or_else(|| derived_value(obj.as_ref(), k)) {
                    Some(v) => v.to_key_string(),
                    None => continue,
                },
            };
            if let Some(value) = obj.field(field).or_else(|| derived_value(obj.as_ref(), field)) {
                values.insert(key_value, value);
            }
        }
        values
    }
}

fn flush_failures(outcome: FlushOutcome) -> usize {
    match outcome {
        FlushOutcome::Empty => 0,
        FlushOutcome::Flushed { failures, .. } => failures,
        FlushOutcome::Skipped(_) => 1,
    }
}

/// Classify ids; results are sorted and pairwise disjoint.
pub fn compute_diff(
    objects: &BTreeMap<ObjectId, Arc<dyn Indexable>>,
    indexed: &HashMap<ObjectId, Option<DateTime<Utc>>>,
) -> DiffResult {
    let mut diff = DiffResult::default();
    for (uid, obj) in objects {
        match indexed.get(uid) {
            None => diff.to_index.push(uid.clone()),
            Some(None) => diff.to_reindex.push(uid.clone()),
            Some(Some(index_modified)) => {
                if truncate_to_millis(&obj.modified()) > *index_modified {
                    diff.to_reindex.push(uid.clone());
                }
            }
        }
    }
    diff.to_unindex = indexed
        .keys()
        .filter(|uid| !objects.contains_key(*uid))
        .cloned()
        .collect();
    diff.to_unindex.sort();
    diff
}
