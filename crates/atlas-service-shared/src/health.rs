//! Health check handlers for liveness and readiness probes.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Health status response for liveness and readiness probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Status indicator: "ok" or "not_ready: <reason>".
    pub status: String,

    pub service: String,

    pub version: String,

    /// Spatial store backend (readiness only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,

    /// Response cache backend (readiness only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<String>,

    /// Whether the cache answered its probe (readiness only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_reachable: Option<bool>,
}

impl HealthStatus {
    pub fn alive(service: &str, version: &str) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            store: None,
            cache: None,
            cache_reachable: None,
        }
    }

    pub fn ready(
        service: &str,
        version: &str,
        store: &str,
        cache: &str,
        cache_reachable: bool,
    ) -> Self {
        Self {
            status: "ok".to_string(),
            store: Some(store.to_string()),
            cache: Some(cache.to_string()),
            cache_reachable: Some(cache_reachable),
            ..Self::alive(service, version)
        }
    }

    pub fn not_ready(service: &str, version: &str, reason: &str) -> Self {
        Self {
            status: format!("not_ready: {}", reason),
            ..Self::alive(service, version)
        }
    }
}

/// Liveness probe handler.
///
/// ```text
/// GET /health/live
/// {"status":"ok","service":"atlas","version":"0.1.0"}
/// ```
pub async fn health_live(State(state): State<AppState>) -> impl IntoResponse {
    let status = HealthStatus::alive(state.service_name(), env!("CARGO_PKG_VERSION"));
    (StatusCode::OK, Json(status))
}

/// Readiness probe handler.
///
/// Asks the store for its current time. An unreachable cache degrades
/// caching but does not make the service unready.
pub async fn health_ready(State(state): State<AppState>) -> Response {
    let service = state.service_name();
    let version = env!("CARGO_PKG_VERSION");

    if let Err(e) = state.store().current_time().await {
        tracing::warn!(error = %e, "readiness probe failed: store unreachable");
        let status = HealthStatus::not_ready(service, version, "store unreachable");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response();
    }

    let cache_reachable = match state.cache().ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "readiness probe: cache unreachable");
            false
        }
    };

    let status = HealthStatus::ready(
        service,
        version,
        state.store().backend(),
        state.cache().backend(),
        cache_reachable,
    );
    (StatusCode::OK, Json(status)).into_response()
}
