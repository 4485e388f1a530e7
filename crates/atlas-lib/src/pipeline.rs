//! Request pipeline: validate, consult the cache, query, shape, memoize.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::cache::{CacheKey, CacheStatus, CachedResponse, ResponseCache};
use crate::error::{Error, Result, StoreError};
use crate::model::{CountBody, SizeBody, TimeBody};
use crate::shape::{shape_location, shape_region};
use crate::store::{SpatialStore, SummaryKind};
use crate::validation::{validate_id, validate_type, EntityId, IdBounds, LocationType};

/// An endpoint with its parameters exactly as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Time,
    LocationsByType { kind: String },
    Kingdoms,
    KingdomSize { id: String },
    KingdomCastles { id: String },
    Summary { table: String, id: String },
}

impl Endpoint {
    /// Validate every parameter in order, stopping at the first failure.
    pub fn validate(&self, bounds: &IdBounds) -> Result<Query> {
        Ok(match self {
            Endpoint::Time => Query::Time,
            Endpoint::LocationsByType { kind } => Query::LocationsByType(validate_type(kind)?),
            Endpoint::Kingdoms => Query::Kingdoms,
            Endpoint::KingdomSize { id } => Query::KingdomSize(validate_id(id, bounds)?),
            Endpoint::KingdomCastles { id } => Query::KingdomCastles(validate_id(id, bounds)?),
            Endpoint::Summary { table, id } => {
                let kind: SummaryKind = table.parse()?;
                Query::Summary(kind, validate_id(id, bounds)?)
            }
        })
    }
}

/// A fully validated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Time,
    LocationsByType(LocationType),
    Kingdoms,
    KingdomSize(EntityId),
    KingdomCastles(EntityId),
    Summary(SummaryKind, EntityId),
}

impl Query {
    /// Path rebuilt from the typed parameters; equal queries share a path.
    pub fn canonical_path(&self) -> String {
        match self {
            Query::Time => "/time".to_string(),
            Query::LocationsByType(kind) => format!("/locations/{}", kind),
            Query::Kingdoms => "/kingdoms".to_string(),
            Query::KingdomSize(id) => format!("/kingdoms/{}/size", id),
            Query::KingdomCastles(id) => format!("/kingdoms/{}/castles", id),
            Query::Summary(kind, id) => format!("/{}/{}/summary", kind.collection(), id),
        }
    }

    /// The liveness probe is never served from the cache.
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, Query::Time)
    }

    /// Stable label for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Query::Time => "time",
            Query::LocationsByType(_) => "locations",
            Query::Kingdoms => "kingdoms",
            Query::KingdomSize(_) => "kingdom_size",
            Query::KingdomCastles(_) => "kingdom_castles",
            Query::Summary(SummaryKind::Region, _) => "kingdom_summary",
            Query::Summary(SummaryKind::Location, _) => "location_summary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    pub method: String,
    pub endpoint: Endpoint,
    /// Raw query string, without the leading `?`.
    pub query: Option<String>,
}

impl PipelineRequest {
    pub fn get(endpoint: Endpoint) -> Self {
        Self {
            method: "GET".to_string(),
            endpoint,
            query: None,
        }
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Lifetime of cached bodies; `None` never expires.
    pub ttl: Option<Duration>,
    pub bounds: IdBounds,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            ttl: Some(Duration::from_secs(3600)),
            bounds: IdBounds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub cache: CacheStatus,
    /// Number of features in a freshly computed collection body.
    pub features: Option<usize>,
}

struct Computed {
    body: Vec<u8>,
    features: Option<usize>,
}

/// Shared request pipeline over an injected store and cache.
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn SpatialStore>,
    cache: Arc<dyn ResponseCache>,
    settings: PipelineSettings,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("store", &self.store.backend())
            .field("cache", &self.cache.backend())
            .field("settings", &self.settings)
            .finish()
    }
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn SpatialStore>,
        cache: Arc<dyn ResponseCache>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            cache,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn SpatialStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<dyn ResponseCache> {
        &self.cache
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run one request through the pipeline.
    ///
    /// Validation failures return before the cache or the store is touched.
    /// Cache failures are logged and never surface to the caller.
    pub async fn handle(&self, request: &PipelineRequest) -> Result<PipelineResponse> {
        let query = request.endpoint.validate(&self.settings.bounds)?;

        if !query.is_cacheable() {
            let computed = self.execute(&query).await?;
            return Ok(PipelineResponse {
                status: 200,
                body: computed.body,
                cache: CacheStatus::Bypass,
                features: computed.features,
            });
        }

        let key = CacheKey::derive(
            &request.method,
            &query.canonical_path(),
            request.query.as_deref(),
        );

        let mut cache_reachable = true;
        match self.cache.lookup(&key).await {
            Ok(Some(hit)) => {
                debug!(key = %key, "cache hit");
                return Ok(PipelineResponse {
                    status: hit.status,
                    body: hit.body,
                    cache: CacheStatus::Hit,
                    features: None,
                });
            }
            Ok(None) => debug!(key = %key, "cache miss"),
            Err(err) => {
                warn!(key = %key, error = %err, "cache lookup failed, treating as miss");
                cache_reachable = false;
            }
        }

        let computed = self.execute(&query).await?;
        let response = CachedResponse {
            status: 200,
            body: computed.body,
        };

        if cache_reachable {
            if let Err(err) = self.cache.store(&key, &response, self.settings.ttl).await {
                warn!(key = %key, error = %err, "cache write failed");
            }
        }

        Ok(PipelineResponse {
            status: response.status,
            body: response.body,
            cache: CacheStatus::Miss,
            features: computed.features,
        })
    }

    async fn execute(&self, query: &Query) -> Result<Computed> {
        self.query_store(query).await.map_err(|err| {
            if let Error::Store(source) = &err {
                error!(endpoint = query.name(), error = %source, "store query failed");
            }
            err
        })
    }

    async fn query_store(&self, query: &Query) -> Result<Computed> {
        match *query {
            Query::Time => {
                let now = self.store.current_time().await?;
                encode(&TimeBody { now })
            }
            Query::LocationsByType(kind) => {
                let rows = self.store.locations_by_type(kind).await?;
                let features = rows
                    .iter()
                    .map(shape_location)
                    .collect::<std::result::Result<Vec<_>, StoreError>>()?;
                encode_collection(&features)
            }
            Query::Kingdoms => {
                let rows = self.store.all_region_boundaries().await?;
                let features = rows
                    .iter()
                    .map(shape_region)
                    .collect::<std::result::Result<Vec<_>, StoreError>>()?;
                encode_collection(&features)
            }
            Query::KingdomSize(id) => {
                let row = self
                    .store
                    .region_size(id)
                    .await?
                    .ok_or(Error::NotFound {
                        entity: "kingdom",
                        id,
                    })?;
                encode(&SizeBody {
                    id,
                    size: row.square_kilometers(),
                })
            }
            Query::KingdomCastles(id) => {
                let count = self
                    .store
                    .poi_count_in_region(id, LocationType::Castle)
                    .await?;
                encode(&CountBody { count })
            }
            Query::Summary(kind, id) => {
                let row = self
                    .store
                    .summary(kind, id)
                    .await?
                    .ok_or(Error::NotFound {
                        entity: kind.entity(),
                        id,
                    })?;
                encode(&row)
            }
        }
    }
}

fn encode<T: Serialize>(body: &T) -> Result<Computed> {
    Ok(Computed {
        body: serde_json::to_vec(body).map_err(Error::Encode)?,
        features: None,
    })
}

fn encode_collection<T: Serialize>(items: &[T]) -> Result<Computed> {
    Ok(Computed {
        body: serde_json::to_vec(items).map_err(Error::Encode)?,
        features: Some(items.len()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_paths_strip_numeric_formatting() {
        let bounds = IdBounds::default();
        let padded = Endpoint::KingdomSize {
            id: "007".to_string(),
        };
        let plain = Endpoint::KingdomSize {
            id: "7".to_string(),
        };
        assert_eq!(
            padded.validate(&bounds).unwrap().canonical_path(),
            plain.validate(&bounds).unwrap().canonical_path()
        );
        assert_eq!(
            plain.validate(&bounds).unwrap().canonical_path(),
            "/kingdoms/7/size"
        );
    }

    #[test]
    fn summary_paths_follow_collection() {
        let region = Query::Summary(SummaryKind::Region, EntityId::new(3));
        let location = Query::Summary(SummaryKind::Location, EntityId::new(3));
        assert_eq!(region.canonical_path(), "/kingdoms/3/summary");
        assert_eq!(location.canonical_path(), "/locations/3/summary");
        assert_ne!(region.name(), location.name());
    }

    #[test]
    fn only_time_bypasses_cache() {
        assert!(!Query::Time.is_cacheable());
        assert!(Query::Kingdoms.is_cacheable());
        assert!(Query::LocationsByType(LocationType::Castle).is_cacheable());
        assert!(Query::KingdomCastles(EntityId::new(1)).is_cacheable());
    }

    #[test]
    fn unknown_summary_table_fails_before_id_validation() {
        let endpoint = Endpoint::Summary {
            table: "castles".to_string(),
            id: "oops".to_string(),
        };
        assert!(matches!(
            endpoint.validate(&IdBounds::default()),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn invalid_parameters_become_validation_errors() {
        let bounds = IdBounds::default();
        let cases = [
            Endpoint::LocationsByType {
                kind: "dragon".to_string(),
            },
            Endpoint::KingdomSize {
                id: "1001".to_string(),
            },
            Endpoint::KingdomCastles {
                id: "abc".to_string(),
            },
            Endpoint::Summary {
                table: "locations".to_string(),
                id: "-1".to_string(),
            },
        ];
        for endpoint in cases {
            assert!(
                matches!(endpoint.validate(&bounds), Err(Error::Validation(_))),
                "{endpoint:?}"
            );
        }
    }

    #[test]
    fn default_settings_expire_after_an_hour() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.ttl, Some(Duration::from_secs(3600)));
        assert_eq!(settings.bounds, IdBounds::default());
    }
}
