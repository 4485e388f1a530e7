use std::path::PathBuf;

use thiserror::Error;

use crate::validation::EntityId;

/// Convenient result alias for the Atlas library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
///
/// Only [`Error::Validation`], [`Error::NotFound`], [`Error::Store`] and
/// [`Error::Configuration`] ever leave the request pipeline; cache failures are
/// absorbed there and only surface when a cache backend cannot be constructed.
#[derive(Debug, Error)]
pub enum Error {
    /// A path or query parameter failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The requested kingdom or location does not exist in the store.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: EntityId },

    /// The backing spatial store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The response cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// An internal discriminator or setting is not recognised.
    #[error("invalid configuration: {message}")]
    Configuration { message: String },

    /// A response body could not be serialized.
    #[error("failed to encode response body: {0}")]
    Encode(#[source] serde_json::Error),
}

impl Error {
    /// Build a configuration error from any displayable message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// A request parameter that does not satisfy its declared constraints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Name of the offending parameter (`id`, `type`).
    pub field: &'static str,
    /// The raw value as received.
    pub value: String,
    /// Short explanation of the failure.
    pub message: String,
    /// Human-readable description of the accepted values.
    pub conditions: String,
}

/// Failures raised by a [`SpatialStore`](crate::store::SpatialStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Wrapper for PostgreSQL driver errors (connectivity, query, decoding).
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// The geometry column of a row could not be turned into a GeoJSON object.
    #[error("malformed geometry for row {gid}: {reason}")]
    MalformedGeometry { gid: i32, reason: String },

    /// The fixture file backing an in-memory store could not be read.
    #[error("failed to read fixture {path}: {source}")]
    FixtureIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The fixture file was readable but not a valid fixture document.
    #[error("invalid fixture {path}: {message}")]
    FixtureFormat { path: PathBuf, message: String },
}

/// Failures raised by a [`ResponseCache`](crate::cache::ResponseCache).
#[derive(Debug, Error)]
pub enum CacheError {
    /// Wrapper for Redis client errors.
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    /// A stored value could not be decoded back into a response.
    #[error("corrupt cache entry for {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// The cache backend is not reachable.
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}
