use crate::error::{IndexSyncError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "indexsync.json";

fn default_port() -> u16 {
    8983
}

fn default_base() -> String {
    "/solr".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

/// Settings for reaching the engine and for shaping queries sent to it.
///
/// The struct is process-wide; components read it through [`SharedConfig`]
/// snapshots so a change never tears a half-read configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub active: bool,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_base")]
    pub base: String,
    /// Commit without waiting for the engine to open a new searcher.
    #[serde(rename = "async")]
    pub async_indexing: bool,
    /// `None` means no limit.
    pub index_timeout_ms: Option<u64>,
    pub search_timeout_ms: Option<u64>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    pub max_results: Option<usize>,
    /// A request is only sent to the engine if at least one of these is present.
    pub required: Vec<String>,
    /// Facet fields used when a request asks for facets without naming any.
    pub facets: Vec<String>,
    /// Fields whose clauses are sent as filter queries instead of `q`.
    pub filter_queries: Vec<String>,
    pub sort_aliases: IndexMap<String, String>,
    /// Multi-valued principal/role fields whose values need delimiter escaping.
    pub principal_fields: Vec<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        let mut sort_aliases = IndexMap::new();
        sort_aliases.insert("sortable_title".to_string(), "Title".to_string());
        ConnectionConfig {
            active: false,
            host: "localhost".to_string(),
            port: default_port(),
            base: default_base(),
            async_indexing: false,
            index_timeout_ms: None,
            search_timeout_ms: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            max_results: None,
            required: vec!["SearchableText".to_string()],
            facets: vec!["portal_type".to_string(), "review_state".to_string()],
            filter_queries: vec!["portal_type".to_string()],
            sort_aliases,
            principal_fields: vec!["allowedRolesAndUsers".to_string()],
        }
    }
}

fn env_list(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

impl ConnectionConfig {
    /// Load `{dir}/indexsync.json`, or fall back to [`ConnectionConfig::from_env`].
    pub fn load_or_default(dir: &Path) -> Self {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str::<ConnectionConfig>(&content) {
                    Ok(config) => {
                        tracing::info!(
                            "Loaded index config: host={} port={} active={}",
                            config.host,
                            config.port,
                            config.active
                        );
                        return config;
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse {}: {}, using defaults",
                            CONFIG_FILE_NAME,
                            e
                        );
                    }
                },
                Err(e) => {
                    tracing::error!("Failed to read {}: {}, using defaults", CONFIG_FILE_NAME, e);
                }
            }
        }
        Self::from_env()
    }

    /// Defaults overridden by `INDEXSYNC_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = ConnectionConfig::default();
        ConnectionConfig {
            active: std::env::var("INDEXSYNC_ACTIVE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.active),
            host: std::env::var("INDEXSYNC_HOST").unwrap_or(defaults.host),
            port: env_parse("INDEXSYNC_PORT").unwrap_or(defaults.port),
            base: std::env::var("INDEXSYNC_BASE").unwrap_or(defaults.base),
            async_indexing: std::env::var("INDEXSYNC_ASYNC")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.async_indexing),
            index_timeout_ms: env_parse("INDEXSYNC_INDEX_TIMEOUT_MS").or(defaults.index_timeout_ms),
            search_timeout_ms: env_parse("INDEXSYNC_SEARCH_TIMEOUT_MS")
                .or(defaults.search_timeout_ms),
            connect_timeout_ms: env_parse("INDEXSYNC_CONNECT_TIMEOUT_MS")
                .unwrap_or(defaults.connect_timeout_ms),
            max_results: env_parse("INDEXSYNC_MAX_RESULTS").or(defaults.max_results),
            required: env_list("INDEXSYNC_REQUIRED").unwrap_or(defaults.required),
            facets: env_list("INDEXSYNC_FACETS").unwrap_or(defaults.facets),
            filter_queries: env_list("INDEXSYNC_FILTER_QUERIES").unwrap_or(defaults.filter_queries),
            sort_aliases: defaults.sort_aliases,
            principal_fields: defaults.principal_fields,
        }
    }

    pub fn index_timeout(&self) -> Option<Duration> {
        self.index_timeout_ms.map(Duration::from_millis)
    }

    pub fn search_timeout(&self) -> Option<Duration> {
        self.search_timeout_ms.map(Duration::from_millis)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// `http://host:port/base`, or a configuration error when no host is set.
    pub fn base_url(&self) -> Result<String> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(IndexSyncError::Config("no engine host configured".to_string()));
        }
        let base = self.base.trim_end_matches('/');
        let base = if base.is_empty() || base.starts_with('/') {
            base.to_string()
        } else {
            format!("/{}", base)
        };
        Ok(format!("http://{}:{}{}", host, self.port, base))
    }

    fn endpoint(&self) -> (bool, &str, u16, &str, u64) {
        (
            self.active,
            &self.host,
            self.port,
            &self.base,
            self.connect_timeout_ms,
        )
    }
}

struct SharedInner {
    current: RwLock<Arc<ConnectionConfig>>,
    generation: AtomicU64,
}

/// Injected handle to the process-wide [`ConnectionConfig`].
///
/// Readers take immutable snapshots. Every change that affects how the engine
/// is reached bumps a generation counter; connections remember the generation
/// they were opened under and are reopened once it moves.
#[derive(Clone)]
pub struct SharedConfig {
    inner: Arc<SharedInner>,
}

impl SharedConfig {
    pub fn new(config: ConnectionConfig) -> Self {
        SharedConfig {
            inner: Arc::new(SharedInner {
                current: RwLock::new(Arc::new(config)),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn snapshot(&self) -> Arc<ConnectionConfig> {
        let guard = self
            .inner
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Apply `f` to a copy of the current config and publish the result.
    pub fn update<F>(&self, f: F) -> Arc<ConnectionConfig>
    where
        F: FnOnce(&mut ConnectionConfig),
    {
        let mut guard = self
            .inner
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = (**guard).clone();
        f(&mut next);
        if next.endpoint() != guard.endpoint() {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
        }
        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        next
    }

    pub fn replace(&self, config: ConnectionConfig) -> Arc<ConnectionConfig> {
        self.update(|c| *c = config)
    }

    /// Force every existing connection to be reopened on next use.
    pub fn invalidate(&self) -> u64 {
        self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl std::fmt::Debug for SharedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedConfig")
            .field("generation", &self.generation())
            .field("config", &self.snapshot())
            .finish()
    }
}
