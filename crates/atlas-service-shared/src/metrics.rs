//! Prometheus metrics infrastructure.
//!
//! - [`MetricsConfig`] / [`init_metrics`]: install the Prometheus recorder
//! - [`metrics_handler`]: axum handler for `GET /metrics`
//! - Business metric helpers for the request pipeline
//!
//! ```no_run
//! use atlas_service_shared::metrics::{init_metrics, metrics_handler, MetricsConfig};
//! use axum::{routing::get, Router};
//!
//! init_metrics(&MetricsConfig::default()).expect("failed to initialize metrics");
//! let app: Router = Router::new().route("/metrics", get(metrics_handler));
//! ```

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use atlas_lib::{CacheStatus, Error as LibError};

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Exposition is always served on `GET /metrics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl MetricsConfig {
    /// - `METRICS_ENABLED`: "true" or "false" (default: true)
    pub fn from_env() -> Self {
        Self::from_value(std::env::var("METRICS_ENABLED").ok().as_deref())
    }

    fn from_value(enabled: Option<&str>) -> Self {
        Self {
            enabled: enabled.map_or(true, |v| !v.trim().eq_ignore_ascii_case("false")),
        }
    }
}

/// Install the Prometheus recorder. Must be called once, before any metric is
/// recorded; later calls fail with [`MetricsError::AlreadyInitialized`].
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Err(MetricsError::Disabled);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::InstallFailed(e.to_string()))?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::AlreadyInitialized)?;

    Ok(())
}

pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Axum handler for the metrics endpoint (Prometheus exposition format).
pub async fn metrics_handler() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|h| h.render())
        .unwrap_or_else(|| "# Metrics not initialized\n".to_string())
}

#[derive(Debug, Clone)]
pub enum MetricsError {
    Disabled,
    AlreadyInitialized,
    InstallFailed(String),
}

impl std::fmt::Display for MetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsError::Disabled => write!(f, "metrics are disabled"),
            MetricsError::AlreadyInitialized => write!(f, "metrics recorder already initialized"),
            MetricsError::InstallFailed(e) => {
                write!(f, "failed to install metrics recorder: {}", e)
            }
        }
    }
}

impl std::error::Error for MetricsError {}

// =============================================================================
// Business Metrics Helpers
// =============================================================================

/// Increment `atlas_cache_lookups_total` for a pipeline response.
pub fn record_cache_outcome(endpoint: &str, status: CacheStatus) {
    metrics::counter!(
        "atlas_cache_lookups_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => status.as_str().to_lowercase()
    )
    .increment(1);
}

/// Increment `atlas_validation_failures_total` for a rejected parameter.
pub fn record_validation_failure(field: &str) {
    metrics::counter!(
        "atlas_validation_failures_total",
        "field" => field.to_string()
    )
    .increment(1);
}

/// Increment `atlas_store_failures_total`.
pub fn record_store_failure(endpoint: &str) {
    metrics::counter!(
        "atlas_store_failures_total",
        "endpoint" => endpoint.to_string()
    )
    .increment(1);
}

/// Record the size of a freshly computed feature collection.
pub fn record_features_returned(endpoint: &str, count: usize) {
    metrics::histogram!(
        "atlas_features_returned",
        "endpoint" => endpoint.to_string()
    )
    .record(count as f64);
}

/// Record the business metrics matching a pipeline error.
pub fn record_pipeline_error(endpoint: &str, error: &LibError) {
    match error {
        LibError::Validation(err) => record_validation_failure(err.field),
        LibError::Store(_) => record_store_failure(endpoint),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_config_default() {
        assert!(MetricsConfig::default().enabled);
    }

    #[test]
    fn test_metrics_config_from_value() {
        assert!(MetricsConfig::from_value(None).enabled);
        assert!(MetricsConfig::from_value(Some("true")).enabled);
        assert!(!MetricsConfig::from_value(Some("FALSE")).enabled);
        assert!(!MetricsConfig::from_value(Some(" false ")).enabled);
    }

    #[tokio::test]
    async fn test_metrics_handler_without_recorder() {
        let output = metrics_handler().await;
        assert!(
            output.contains('#') || output.is_empty(),
            "metrics output should be exposition text or a not-initialized comment"
        );
    }

    #[test]
    fn test_business_metric_helpers_do_not_panic() {
        record_cache_outcome("kingdoms", CacheStatus::Hit);
        record_cache_outcome("kingdoms", CacheStatus::Miss);
        record_validation_failure("id");
        record_store_failure("kingdom_size");
        record_features_returned("locations", 4);
    }

    #[test]
    fn test_record_pipeline_error_accepts_every_kind() {
        let validation = atlas_lib::validate_type("dragon").unwrap_err();
        record_pipeline_error("locations", &LibError::Validation(validation));
        record_pipeline_error("kingdoms", &LibError::configuration("bad table"));
    }

    #[test]
    fn test_metrics_error_display() {
        assert_eq!(MetricsError::Disabled.to_string(), "metrics are disabled");
        assert_eq!(
            MetricsError::AlreadyInitialized.to_string(),
            "metrics recorder already initialized"
        );
        let failed = MetricsError::InstallFailed("test error".to_string());
        assert!(failed.to_string().contains("test error"));
    }
}
