//! # indexsync
//!
//! Keeps a remote, Solr-compatible full-text index consistent with a
//! transactional object repository.
//!
//! The crate has three layers:
//!
//! - [`ConnectionManager`] hands out one connection per execution context
//!   ([`ContextId`]), caches the engine schema per connection and replaces
//!   dead or outdated connections transparently.
//! - [`IndexQueueProcessor`] queues index operations for the running
//!   transaction and flushes them on commit (or drops them on abort).
//! - [`ReconciliationEngine`] and [`SearchDispatcher`] repair drift between
//!   repository and index, and route searches to the engine or back to the
//!   repository's own query engine.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use indexsync::{ConnectionConfig, ConnectionManager, IndexQueueProcessor, SharedConfig};
//! use indexsync::query::{SearchDispatcher, SearchRequest};
//!
//! # async fn run(obj: &dyn indexsync::Indexable) {
//! let config = SharedConfig::new(ConnectionConfig {
//!     active: true,
//!     ..ConnectionConfig::load_or_default(std::path::Path::new("."))
//! });
//! let manager = ConnectionManager::with_http(config);
//!
//! let scope = manager.enter();
//! let mut queue = IndexQueueProcessor::for_scope(&scope);
//! queue.index(obj, None).await;
//! queue.commit().await;
//!
//! let dispatcher = SearchDispatcher::new(manager.clone());
//! let request = SearchRequest::new().with("SearchableText", "news");
//! let outcome = dispatcher.search(scope.id(), &request).await;
//! # }
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod query;
pub mod transport;
pub mod types;

pub use config::{ConnectionConfig, SharedConfig};
pub use error::{IndexSyncError, Result};
pub use index::{
    ConnectionManager, ContextId, ContextScope, FlushOutcome, IndexQueueProcessor, Indexable,
    ReconciliationEngine, Repository,
};
pub use query::{FallBackReason, SearchDispatcher, SearchOutcome};
pub use types::*;

/// Install a `tracing` fmt subscriber filtered by `INDEXSYNC_LOG` (default `info`).
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("INDEXSYNC_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
