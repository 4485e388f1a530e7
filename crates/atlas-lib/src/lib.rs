//! Atlas library entry points.
//!
//! This crate holds everything behind the HTTP surface: parameter validation,
//! the spatial store abstraction (PostGIS or an in-memory fixture), GeoJSON
//! shaping, the response cache and the [`Pipeline`] that ties them together.
//! Service binaries should go through [`Pipeline::handle`] rather than calling
//! the store directly.

pub mod cache;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod shape;
pub mod store;
pub mod validation;

pub use cache::{
    CacheKey, CacheStatus, CachedResponse, DisabledCache, MemoryCache, RedisCache, ResponseCache,
};
pub use error::{CacheError, Error, Result, StoreError, ValidationError};
pub use model::{
    CountBody, FeatureProperties, GeoFeature, PointOfInterestRow, RegionRow, RegionSizeRow,
    SizeBody, SummaryRow, TimeBody,
};
pub use pipeline::{
    Endpoint, Pipeline, PipelineRequest, PipelineResponse, PipelineSettings, Query,
};
pub use shape::{shape, shape_location, shape_region};
pub use store::{
    MemoryStore, PostgisStore, SpatialStore, StoreFixture, StoreSettings, SummaryKind,
};
pub use validation::{validate_id, validate_type, EntityId, IdBounds, LocationType};
