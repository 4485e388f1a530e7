//! Application state for the HTTP service.
//!
//! Holds the request [`Pipeline`] with its injected store and cache handles,
//! built once at startup. An in-process cache gets a background task that
//! sweeps expired entries for as long as the state is alive.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use atlas_lib::{
    CacheError, DisabledCache, MemoryCache, MemoryStore, Pipeline, PipelineSettings, PostgisStore,
    RedisCache, ResponseCache, SpatialStore, StoreError,
};

use crate::config::{CacheBackend, ServiceConfig, StoreBackend};

/// Error during application state initialization.
#[derive(Debug)]
pub enum AppStateError {
    /// The spatial store could not be opened.
    Store(StoreError),

    /// The cache backend could not be reached.
    Cache(CacheError),
}

impl std::fmt::Display for AppStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(e) => write!(f, "failed to open spatial store: {}", e),
            Self::Cache(e) => write!(f, "failed to connect response cache: {}", e),
        }
    }
}

impl std::error::Error for AppStateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::Cache(e) => Some(e),
        }
    }
}

impl From<StoreError> for AppStateError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<CacheError> for AppStateError {
    fn from(err: CacheError) -> Self {
        Self::Cache(err)
    }
}

/// Shared application state for all axum handlers.
///
/// Cheaply cloneable; share it through axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pipeline: Pipeline,
    service_name: String,
    purge_task: Option<JoinHandle<()>>,
}

impl Drop for AppStateInner {
    fn drop(&mut self) {
        if let Some(task) = self.purge_task.take() {
            task.abort();
        }
    }
}

/// Name reported when state is built without a [`ServiceConfig`].
pub const DEFAULT_SERVICE_NAME: &str = "atlas";

impl AppState {
    /// Open the configured store and cache.
    pub async fn connect(config: &ServiceConfig) -> Result<Self, AppStateError> {
        let store: Arc<dyn SpatialStore> = match &config.store {
            StoreBackend::Postgres(settings) => Arc::new(PostgisStore::connect(settings).await?),
            StoreBackend::Memory { fixture } => Arc::new(MemoryStore::load(fixture)?),
        };

        let mut purge_task = None;
        let cache: Arc<dyn ResponseCache> = match &config.cache {
            CacheBackend::Redis { url, prefix } => {
                Arc::new(RedisCache::connect(url, prefix.clone()).await?)
            }
            CacheBackend::Memory {
                max_entries,
                purge_interval,
            } => {
                let cache = match max_entries {
                    Some(max) => MemoryCache::bounded(*max),
                    None => MemoryCache::new(),
                };
                purge_task = purge_interval.map(|every| spawn_purge(cache.clone(), every));
                Arc::new(cache)
            }
            CacheBackend::Disabled => Arc::new(DisabledCache),
        };

        tracing::info!(
            service = %config.service_name,
            store = store.backend(),
            cache = cache.backend(),
            "application state ready"
        );

        Ok(Self::build(
            store,
            cache,
            config.pipeline,
            config.service_name.clone(),
            purge_task,
        ))
    }

    /// Create application state from pre-built components.
    pub fn from_components(
        store: Arc<dyn SpatialStore>,
        cache: Arc<dyn ResponseCache>,
        settings: PipelineSettings,
    ) -> Self {
        Self::build(store, cache, settings, DEFAULT_SERVICE_NAME.to_string(), None)
    }

    fn build(
        store: Arc<dyn SpatialStore>,
        cache: Arc<dyn ResponseCache>,
        settings: PipelineSettings,
        service_name: String,
        purge_task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                pipeline: Pipeline::new(store, cache, settings),
                service_name,
                purge_task,
            }),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    pub fn store(&self) -> &Arc<dyn SpatialStore> {
        self.inner.pipeline.store()
    }

    pub fn cache(&self) -> &Arc<dyn ResponseCache> {
        self.inner.pipeline.cache()
    }
}

/// Sweep expired entries from `cache` every `every` until aborted.
fn spawn_purge(cache: MemoryCache, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            cache.purge_expired();
        }
    })
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.service_name())
            .field("store", &self.store().backend())
            .field("cache", &self.cache().backend())
            .finish()
    }
}
