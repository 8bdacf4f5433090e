//! Per-transaction queue of index operations.
//!
//! Operations accumulate while the surrounding transaction runs and reach the
//! engine only on [`IndexQueueProcessor::commit`]; [`IndexQueueProcessor::abort`]
//! drops them without any engine traffic.

use super::document::{build_update, quote_phrase};
use super::manager::{ConnectionManager, ContextId, ContextScope};
use super::repository::Indexable;
use crate::error::IndexSyncError;
use crate::transport::{CommitOptions, UpdateDocument};
use crate::types::ObjectId;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum PendingOperation {
    Add {
        id: ObjectId,
        fields: UpdateDocument,
        /// Merge into the existing record instead of replacing it.
        partial: bool,
    },
    Delete {
        id: ObjectId,
    },
    Commit,
}

impl PendingOperation {
    pub fn id(&self) -> Option<&str> {
        match self {
            PendingOperation::Add { id, .. } | PendingOperation::Delete { id } => Some(id),
            PendingOperation::Commit => None,
        }
    }
}

/// What a [`IndexQueueProcessor::commit`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The queue was empty; the engine was not contacted.
    Empty,
    /// Operations were sent; `failures` of them (commit included) were rejected.
    Flushed { operations: usize, failures: usize },
    /// No connection could be obtained; the queue was dropped.
    Skipped(String),
}

impl FlushOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            FlushOutcome::Empty | FlushOutcome::Flushed { failures: 0, .. }
        )
    }
}

pub struct IndexQueueProcessor {
    manager: Arc<ConnectionManager>,
    ctx: ContextId,
    queue: Vec<PendingOperation>,
    index_timeout_disabled: bool,
}

impl IndexQueueProcessor {
    pub fn new(manager: Arc<ConnectionManager>, ctx: ContextId) -> Self {
        IndexQueueProcessor {
            manager,
            ctx,
            queue: Vec::new(),
            index_timeout_disabled: false,
        }
    }

    pub fn for_scope(scope: &ContextScope) -> Self {
        Self::new(Arc::clone(scope.manager()), scope.id())
    }

    pub fn context(&self) -> ContextId {
        self.ctx
    }

    pub fn pending(&self) -> &[PendingOperation] {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Toggle the per-call index timeout; returns the previous setting.
    pub fn set_index_timeout_disabled(&mut self, disabled: bool) -> bool {
        std::mem::replace(&mut self.index_timeout_disabled, disabled)
    }

    fn index_timeout(&self) -> Option<Duration> {
        if self.index_timeout_disabled {
            None
        } else {
            self.manager.config().snapshot().index_timeout()
        }
    }

    /// Queue an add. `None` captures every schema field; `Some(attrs)` sends
    /// only those fields as a partial update.
    pub async fn index(&mut self, obj: &dyn Indexable, attributes: Option<&[String]>) {
        let config = self.manager.config().snapshot();
        if !config.active {
            tracing::debug!("[WQ {}] inactive, not indexing {}", self.ctx, obj.uid());
            return;
        }
        let uid = obj.uid();
        if uid.is_empty() {
            tracing::warn!("[WQ {}] object at {} has no unique id, skipping", self.ctx, obj.path());
            return;
        }
        let Some(schema) = self.manager.get_schema(self.ctx).await else {
            tracing::warn!("unable to fetch schema, skipping indexing of {}", uid);
            return;
        };

        let fields = build_update(obj, &schema, attributes, &config.principal_fields);
        let partial = attributes.is_some();
        if partial && fields.len() <= 1 {
            tracing::debug!(
                "[WQ {}] none of {:?} are indexed fields, nothing to update for {}",
                self.ctx,
                attributes.unwrap_or_default(),
                uid
            );
            return;
        }
        tracing::debug!(
            "[WQ {}] queued {} of {} ({} fields)",
            self.ctx,
            if partial { "partial add" } else { "add" },
            uid,
            fields.len()
        );
        self.queue.push(PendingOperation::Add {
            id: uid,
            fields,
            partial,
        });
    }

    pub async fn reindex(&mut self, obj: &dyn Indexable, attributes: Option<&[String]>) {
        self.index(obj, attributes).await
    }

    /// Queue a delete of `obj`'s record.
    pub async fn unindex(&mut self, obj: &dyn Indexable) {
        let uid = obj.uid();
        if uid.is_empty() {
            tracing::warn!("[WQ {}] object at {} has no unique id, skipping", self.ctx, obj.path());
            return;
        }
        self.unindex_id(uid).await
    }

    /// Queue a delete for a record the repository no longer holds.
    pub async fn unindex_id(&mut self, uid: ObjectId) {
        if !self.manager.config().snapshot().active {
            return;
        }
        if self.manager.get_schema(self.ctx).await.is_none() {
            tracing::warn!("unable to fetch schema, skipping unindexing of {}", uid);
            return;
        }
        tracing::debug!("[WQ {}] queued delete of {}", self.ctx, uid);
        self.queue.push(PendingOperation::Delete { id: uid });
    }

    /// Drop everything queued; the engine is never contacted.
    pub fn abort(&mut self) {
        if !self.queue.is_empty() {
            tracing::debug!("[WQ {}] aborting {} queued operations", self.ctx, self.queue.len());
        }
        self.queue.clear();
    }

    /// Send the queue to the engine followed by a commit, then clear it.
    ///
    /// Failures are logged with the attempted payload and never propagated;
    /// operations after a failed one are still sent.
    pub async fn commit(&mut self) -> FlushOutcome {
        if self.queue.is_empty() {
            return FlushOutcome::Empty;
        }
        let mut ops = std::mem::take(&mut self.queue);
        ops.push(PendingOperation::Commit);

        let conn = match self.manager.get_connection(self.ctx).await {
            Ok(conn) => conn,
            Err(IndexSyncError::Inactive) => {
                return FlushOutcome::Skipped(IndexSyncError::Inactive.to_string())
            }
            Err(e) => {
                tracing::error!(
                    "[WQ {}] no connection, dropping {} operations: {}",
                    self.ctx,
                    ops.len() - 1,
                    e
                );
                return FlushOutcome::Skipped(e.to_string());
            }
        };
        let config = self.manager.config().snapshot();
        let timeout = self.index_timeout();
        let unique_key = match conn.schema().await {
            Ok(schema) => Some(schema.unique_key().to_string()),
            Err(e) => {
                tracing::warn!("[WQ {}] schema unavailable during flush: {}", self.ctx, e);
                None
            }
        };

        let operations = ops.len();
        let mut failures = 0;
        let mut batch: Vec<UpdateDocument> = Vec::new();
        for op in ops {
            if !matches!(op, PendingOperation::Add { .. }) && !batch.is_empty() {
                if let Err(e) = conn.add(&batch, timeout).await {
                    log_failure(&batch, &e);
                    failures += 1;
                }
                batch.clear();
            }
            match op {
                PendingOperation::Add { fields, .. } => batch.push(fields),
                PendingOperation::Delete { id } => {
                    let Some(ref key) = unique_key else {
                        tracing::error!(
                            "exception during request: cannot delete {} without schema",
                            id
                        );
                        failures += 1;
                        continue;
                    };
                    let query = format!("{}:{}", key, quote_phrase(&id));
                    if let Err(e) = conn.delete_by_query(&query, timeout).await {
                        log_failure(&query, &e);
                        failures += 1;
                    }
                }
                PendingOperation::Commit => {
                    let options = CommitOptions {
                        wait_searcher: !config.async_indexing,
                    };
                    if let Err(e) = conn.commit(options, timeout).await {
                        log_failure(&"<commit/>", &e);
                        failures += 1;
                    }
                }
            }
        }

        if failures == 0 {
            tracing::debug!("[WQ {}] flushed {} operations", self.ctx, operations);
        } else {
            tracing::warn!(
                "[WQ {}] flushed {} operations with {} failures",
                self.ctx,
                operations,
                failures
            );
        }
        FlushOutcome::Flushed {
            operations,
            failures,
        }
    }
}

impl Drop for IndexQueueProcessor {
    fn drop(&mut self) {
        if !self.queue.is_empty() {
            tracing::warn!(
                "[WQ {}] dropped with {} uncommitted operations",
                self.ctx,
                self.queue.len()
            );
        }
    }
}

fn log_failure<T: serde::Serialize + ?Sized>(payload: &T, error: &IndexSyncError) {
    let payload = serde_json::to_string(payload).unwrap_or_default();
    tracing::error!("exception during request {}: {}", payload, error);
}
