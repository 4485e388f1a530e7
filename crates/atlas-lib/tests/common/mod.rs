//! Shared helpers for atlas-lib integration tests.
//!
//! Provides the checked-in fixture store, a store that always fails, and
//! store and cache wrappers that count calls or fail on demand.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use atlas_lib::{
    CacheError, CacheKey, CachedResponse, EntityId, LocationType, MemoryCache, MemoryStore,
    Pipeline, PipelineSettings, PointOfInterestRow, RegionRow, RegionSizeRow, ResponseCache,
    SpatialStore, StoreError, SummaryKind, SummaryRow,
};
use chrono::{DateTime, Utc};

/// Path to the fixtures directory at the workspace root.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures")
}

pub fn fixture_store() -> MemoryStore {
    MemoryStore::load(fixtures_dir().join("westeros.json")).expect("load westeros fixture")
}

/// Store wrapper that counts every call reaching the inner store.
pub struct CountingStore<S> {
    inner: S,
    calls: AtomicUsize,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: SpatialStore> SpatialStore for CountingStore<S> {
    async fn current_time(&self) -> Result<DateTime<Utc>, StoreError> {
        self.hit();
        self.inner.current_time().await
    }

    async fn locations_by_type(
        &self,
        kind: LocationType,
    ) -> Result<Vec<PointOfInterestRow>, StoreError> {
        self.hit();
        self.inner.locations_by_type(kind).await
    }

    async fn all_region_boundaries(&self) -> Result<Vec<RegionRow>, StoreError> {
        self.hit();
        self.inner.all_region_boundaries().await
    }

    async fn region_size(&self, id: EntityId) -> Result<Option<RegionSizeRow>, StoreError> {
        self.hit();
        self.inner.region_size(id).await
    }

    async fn poi_count_in_region(
        &self,
        id: EntityId,
        category: LocationType,
    ) -> Result<i64, StoreError> {
        self.hit();
        self.inner.poi_count_in_region(id, category).await
    }

    async fn summary(
        &self,
        kind: SummaryKind,
        id: EntityId,
    ) -> Result<Option<SummaryRow>, StoreError> {
        self.hit();
        self.inner.summary(kind, id).await
    }

    fn backend(&self) -> &'static str {
        self.inner.backend()
    }
}

enum Failure {
    Unavailable,
    MalformedRow,
}

/// Store whose queries fail, either outright or with one unparsable row.
pub struct FailingStore {
    failure: Failure,
}

impl FailingStore {
    /// Every query fails with a driver error.
    pub fn unavailable() -> Self {
        Self {
            failure: Failure::Unavailable,
        }
    }

    /// Collection queries return a valid row followed by gid 2 with broken
    /// geometry; scalar queries fail with a driver error.
    pub fn malformed_row() -> Self {
        Self {
            failure: Failure::MalformedRow,
        }
    }

    fn rows<T>(&self, good: T, bad: T) -> Result<Vec<T>, StoreError> {
        match self.failure {
            Failure::Unavailable => Err(StoreError::Database(sqlx::Error::PoolTimedOut)),
            Failure::MalformedRow => Ok(vec![good, bad]),
        }
    }
}

const POINT: &str = r#"{"type":"Point","coordinates":[1,2]}"#;

#[async_trait]
impl SpatialStore for FailingStore {
    async fn current_time(&self) -> Result<DateTime<Utc>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn locations_by_type(
        &self,
        kind: LocationType,
    ) -> Result<Vec<PointOfInterestRow>, StoreError> {
        let row = |gid: i32, geojson: &str| PointOfInterestRow {
            gid,
            name: format!("poi {gid}"),
            kind: kind.as_str().to_string(),
            geojson: geojson.to_string(),
        };
        self.rows(row(1, POINT), row(2, "not geojson"))
    }

    async fn all_region_boundaries(&self) -> Result<Vec<RegionRow>, StoreError> {
        let row = |gid: i32, geojson: &str| RegionRow {
            gid,
            name: format!("region {gid}"),
            geojson: geojson.to_string(),
        };
        self.rows(row(1, POINT), row(2, "[1, 2]"))
    }

    async fn region_size(&self, _id: EntityId) -> Result<Option<RegionSizeRow>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn poi_count_in_region(
        &self,
        _id: EntityId,
        _category: LocationType,
    ) -> Result<i64, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn summary(
        &self,
        _kind: SummaryKind,
        _id: EntityId,
    ) -> Result<Option<SummaryRow>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}

/// Cache wrapper counting lookups and writes, optionally failing them.
pub struct ProbeCache {
    inner: MemoryCache,
    fail_lookups: bool,
    fail_writes: bool,
    lookups: AtomicUsize,
    writes: AtomicUsize,
}

impl ProbeCache {
    pub fn healthy() -> Self {
        Self::build(false, false)
    }

    /// Lookups and writes both fail.
    pub fn failing() -> Self {
        Self::build(true, true)
    }

    /// Lookups succeed (and miss); writes fail.
    pub fn read_only() -> Self {
        Self::build(false, true)
    }

    fn build(fail_lookups: bool, fail_writes: bool) -> Self {
        Self {
            inner: MemoryCache::new(),
            fail_lookups,
            fail_writes,
            lookups: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn entries(&self) -> &MemoryCache {
        &self.inner
    }
}

#[async_trait]
impl ResponseCache for ProbeCache {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CachedResponse>, CacheError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        self.inner.lookup(key).await
    }

    async fn store(
        &self,
        key: &CacheKey,
        response: &CachedResponse,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        self.inner.store(key, response, ttl).await
    }

    fn backend(&self) -> &'static str {
        "probe"
    }
}

/// Counted store and probe cache wired into a pipeline with default settings.
pub struct Harness<S = MemoryStore> {
    pub store: Arc<CountingStore<S>>,
    pub cache: Arc<ProbeCache>,
    pub pipeline: Pipeline,
}

impl Harness {
    /// The fixture store behind a healthy cache.
    pub fn new() -> Self {
        Self::with_cache(ProbeCache::healthy())
    }

    pub fn with_cache(cache: ProbeCache) -> Self {
        Self::with_store(fixture_store(), cache)
    }
}

impl<S: SpatialStore + 'static> Harness<S> {
    pub fn with_store(store: S, cache: ProbeCache) -> Self {
        let store = Arc::new(CountingStore::new(store));
        let cache = Arc::new(cache);
        let pipeline = Pipeline::new(
            store.clone(),
            cache.clone(),
            PipelineSettings::default(),
        );
        Self {
            store,
            cache,
            pipeline,
        }
    }
}
