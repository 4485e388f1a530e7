//! Shared HTTP infrastructure for the Atlas geospatial API.
//!
//! - [`AppState`]: the request pipeline with its store and cache handles
//! - [`ServiceConfig`]: environment-driven configuration
//! - [`health`]: liveness and readiness probes
//! - [`ProblemDetails`]: RFC 9457 error bodies
//! - [`ServiceResponse`]: pipeline output as an HTTP response with `x-cache`
//! - [`metrics`]: Prometheus recorder and business metrics
//! - [`logging`]: structured logging setup
//! - [`middleware`]: request ids, spans and HTTP metrics
//!
//! # Architecture
//!
//! Handlers stay thin; every decision about parameters, caching and queries
//! is made in `atlas-lib`:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  axum Handler                                               │
//! │  - Capture raw path parameters                              │
//! │  - Call atlas_lib::Pipeline::handle                         │
//! │  - Map the result to JSON or a problem document             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Testing Support
//!
//! The [`test_utils`] module builds state over the checked-in fixture. Enable
//! the `test-utils` feature to access it from dependent crates.

pub mod config;
mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;
mod problem;
mod request;
mod response;
mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{CacheBackend, ConfigError, ServiceConfig, StoreBackend};
pub use health::{health_live, health_ready, HealthStatus};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{
    init_metrics, metrics_handler, record_cache_outcome, record_features_returned,
    record_pipeline_error, record_store_failure, record_validation_failure, MetricsConfig,
    MetricsError,
};
pub use middleware::{extract_or_generate_request_id, MetricsLayer, RequestId, REQUEST_ID_HEADER};
pub use problem::{
    from_lib_error, ProblemDetails, PROBLEM_INTERNAL_ERROR, PROBLEM_INVALID_PARAMETER,
    PROBLEM_NOT_FOUND,
};
pub use request::{pipeline_request, IdPath, KeyPath};
pub use response::{ServiceResponse, CACHE_STATUS_HEADER};
pub use state::{AppState, AppStateError, DEFAULT_SERVICE_NAME};
