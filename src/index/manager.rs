use crate::config::SharedConfig;
use crate::error::{IndexSyncError, Result};
use crate::index::schema::Schema;
use crate::transport::http::HttpTransportFactory;
use crate::transport::{CommitOptions, QueryParams, Transport, TransportFactory, UpdateDocument};
use crate::types::SearchResponse;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Identifies one execution context (a task, thread or request).
///
/// Connections and pending-operation queues are keyed by it; nothing keyed by
/// one context is ever visible to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    pub fn new() -> Self {
        ContextId(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx-{}", &self.0.simple().to_string()[..8])
    }
}

/// A live session with the engine, owned by one execution context.
pub struct Connection {
    id: Uuid,
    generation: u64,
    base_url: String,
    transport: Arc<dyn Transport>,
    schema: tokio::sync::OnceCell<Arc<Schema>>,
    schema_timeout: Duration,
    dead: AtomicBool,
}

impl Connection {
    fn new(
        generation: u64,
        base_url: String,
        transport: Arc<dyn Transport>,
        schema_timeout: Duration,
    ) -> Self {
        Connection {
            id: Uuid::new_v4(),
            generation,
            base_url,
            transport,
            schema: tokio::sync::OnceCell::new(),
            schema_timeout,
            dead: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::SeqCst)
    }

    pub fn mark_dead(&self) {
        self.dead.store(true, Ordering::SeqCst);
    }

    /// The schema if it has already been fetched on this connection.
    pub fn cached_schema(&self) -> Option<Arc<Schema>> {
        self.schema.get().cloned()
    }

    /// Fetch the schema once; a failed fetch leaves the cache empty.
    pub async fn schema(&self) -> Result<Arc<Schema>> {
        let schema = self
            .schema
            .get_or_try_init(|| async {
                let schema = self
                    .call("schema", Some(self.schema_timeout), self.transport.get_schema())
                    .await?;
                tracing::debug!(
                    "[CONN {}] cached schema with {} fields",
                    self.base_url,
                    schema.len()
                );
                Ok::<_, IndexSyncError>(Arc::new(schema))
            })
            .await?;
        Ok(Arc::clone(schema))
    }

    async fn call<T, F>(&self, operation: &str, timeout: Option<Duration>, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(r) => r,
                Err(_) => Err(IndexSyncError::Timeout {
                    operation: operation.to_string(),
                    after_ms: limit.as_millis() as u64,
                }),
            },
            None => fut.await,
        };
        if let Err(ref e) = result {
            if e.is_connection_failure() {
                self.mark_dead();
            }
        }
        result
    }

    pub async fn add(&self, docs: &[UpdateDocument], timeout: Option<Duration>) -> Result<()> {
        self.call("add", timeout, self.transport.add(docs)).await
    }

    pub async fn delete_by_query(&self, query: &str, timeout: Option<Duration>) -> Result<()> {
        self.call("delete", timeout, self.transport.delete_by_query(query))
            .await
    }

    pub async fn commit(&self, options: CommitOptions, timeout: Option<Duration>) -> Result<()> {
        self.call("commit", timeout, self.transport.commit(options))
            .await
    }

    pub async fn search(
        &self,
        params: &QueryParams,
        timeout: Option<Duration>,
    ) -> Result<SearchResponse> {
        self.call("search", timeout, self.transport.search(params))
            .await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("base_url", &self.base_url)
            .field("generation", &self.generation)
            .field("dead", &self.is_dead())
            .field("schema_cached", &self.schema.initialized())
            .finish()
    }
}

/// Owns one lazily-created connection per execution context.
///
/// `ConnectionManager` is shared (`Arc`) between all contexts of a process;
/// the configuration it reads is the injected [`SharedConfig`].
pub struct ConnectionManager {
    config: SharedConfig,
    factory: Arc<dyn TransportFactory>,
    connections: DashMap<ContextId, Arc<Connection>>,
    reconnects: AtomicU64,
}

impl ConnectionManager {
    pub fn new(config: SharedConfig, factory: Arc<dyn TransportFactory>) -> Arc<Self> {
        Arc::new(ConnectionManager {
            config,
            factory,
            connections: DashMap::new(),
            reconnects: AtomicU64::new(0),
        })
    }

    /// Manager using the bundled HTTP transport.
    pub fn with_http(config: SharedConfig) -> Arc<Self> {
        Self::new(config, Arc::new(HttpTransportFactory::default()))
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Start a new execution context; its connection is closed when the scope drops.
    pub fn enter(self: &Arc<Self>) -> ContextScope {
        let id = ContextId::new();
        tracing::debug!("[CONN] entering context {}", id);
        ContextScope {
            id,
            manager: Arc::clone(self),
        }
    }

    /// Return the context-local connection, opening a new one if there is
    /// none, the previous one died, or the configuration changed since.
    pub async fn get_connection(&self, ctx: ContextId) -> Result<Arc<Connection>> {
        let config = self.config.snapshot();
        if !config.active {
            return Err(IndexSyncError::Inactive);
        }
        let generation = self.config.generation();

        let existing = self.connections.get(&ctx).map(|c| Arc::clone(&c));
        if let Some(conn) = existing {
            if !conn.is_dead() && conn.generation() == generation {
                return Ok(conn);
            }
            if conn.is_dead() {
                self.reconnects.fetch_add(1, Ordering::SeqCst);
                tracing::info!("[CONN {}] replacing dead connection to {}", ctx, conn.base_url());
            } else {
                tracing::info!("[CONN {}] configuration changed, reconnecting", ctx);
            }
            self.connections.remove(&ctx);
        }

        let base_url = config.base_url()?;
        let limit = config.connect_timeout();
        let transport = match tokio::time::timeout(limit, self.factory.connect(&config)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(IndexSyncError::Timeout {
                    operation: "connect".to_string(),
                    after_ms: limit.as_millis() as u64,
                })
            }
        };
        let conn = Arc::new(Connection::new(generation, base_url, transport, limit));
        tracing::debug!("[CONN {}] opened connection to {}", ctx, conn.base_url());
        self.connections.insert(ctx, Arc::clone(&conn));
        Ok(conn)
    }

    /// Release the context-local connection and its cached schema.
    ///
    /// Returns `false` if there was nothing to close.
    pub fn close_connection(&self, ctx: ContextId) -> bool {
        match self.connections.remove(&ctx) {
            Some((_, conn)) => {
                tracing::debug!("[CONN {}] closed connection to {}", ctx, conn.base_url());
                true
            }
            None => false,
        }
    }

    /// Update where the engine lives; every context reconnects on next use.
    pub fn set_host(&self, active: bool, host: &str, port: u16, base: Option<&str>) {
        self.config.update(|c| {
            c.active = active;
            c.host = host.to_string();
            c.port = port;
            if let Some(base) = base {
                c.base = base.to_string();
            }
        });
        self.config.invalidate();
        tracing::info!("[CONN] engine set to {}:{} (active={})", host, port, active);
    }

    /// The schema for `ctx`'s connection, or `None` when it cannot be loaded.
    pub async fn get_schema(&self, ctx: ContextId) -> Option<Arc<Schema>> {
        let conn = match self.get_connection(ctx).await {
            Ok(conn) => conn,
            Err(IndexSyncError::Inactive) => return None,
            Err(e) => {
                tracing::error!("exception while getting schema: {}", e);
                return None;
            }
        };
        match conn.schema().await {
            Ok(schema) => Some(schema),
            Err(e) => {
                tracing::error!("exception while getting schema: {}", e);
                None
            }
        }
    }

    /// Number of dead connections that have been transparently replaced.
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::SeqCst)
    }

    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }
}

/// Entry/exit hook for an execution context.
pub struct ContextScope {
    id: ContextId,
    manager: Arc<ConnectionManager>,
}

impl ContextScope {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        self.manager.close_connection(self.id);
    }
}
