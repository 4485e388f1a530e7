//! Atlas geospatial read API: router and handlers.
//!
//! # Endpoints
//!
//! Every API route is served both at the root and under `/api`:
//!
//! - `GET /` - greeting
//! - `GET /time` - store time (never cached)
//! - `GET /locations/{type}` - locations of one category as GeoJSON
//! - `GET /locations/{id}/summary` - location summary
//! - `GET /kingdoms` - kingdom boundaries as GeoJSON
//! - `GET /kingdoms/{id}/size` - kingdom area in km²
//! - `GET /kingdoms/{id}/castles` - number of castles in a kingdom
//! - `GET /kingdoms/{id}/summary` - kingdom summary
//!
//! Operational routes: `GET /metrics`, `GET /health/live`, `GET /health/ready`.

use axum::{
    extract::{Path, State},
    http::{header::InvalidHeaderValue, HeaderMap, HeaderValue, Method, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;

use atlas_lib::Endpoint;
use atlas_service_shared::{
    extract_or_generate_request_id, from_lib_error, health_live, health_ready, metrics_handler,
    pipeline_request, record_cache_outcome, record_features_returned, record_pipeline_error,
    AppState, IdPath, KeyPath, MetricsLayer, ServiceResponse,
};

/// Body of `GET /`.
pub const GREETING: &str = "API - Hello friend ! ";

/// Build the application router.
pub fn app(state: AppState) -> Router {
    router().layer(MetricsLayer).with_state(state)
}

/// Build the application router, allowing cross-origin GETs from `origin`.
pub fn app_with_cors(state: AppState, origin: &str) -> Result<Router, InvalidHeaderValue> {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_str(origin)?)
        .allow_methods([Method::GET]);

    Ok(router().layer(cors).layer(MetricsLayer).with_state(state))
}

fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .merge(api_routes())
        .nest("/api", api_routes().route("/", get(root)))
        .route("/metrics", get(metrics_handler))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/time", get(time))
        .route("/locations/{key}", get(locations_by_type))
        .route("/locations/{key}/summary", get(location_summary))
        .route("/kingdoms", get(kingdoms))
        .route("/kingdoms/{id}/size", get(kingdom_size))
        .route("/kingdoms/{id}/castles", get(kingdom_castles))
        .route("/kingdoms/{id}/summary", get(kingdom_summary))
}

async fn root() -> &'static str {
    GREETING
}

/// Run an endpoint through the pipeline and map the outcome to HTTP.
async fn dispatch(
    state: &AppState,
    label: &'static str,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    endpoint: Endpoint,
) -> Response {
    let request = pipeline_request(method, uri, endpoint);

    match state.pipeline().handle(&request).await {
        Ok(response) => {
            record_cache_outcome(label, response.cache);
            if let Some(count) = response.features {
                record_features_returned(label, count);
            }
            ServiceResponse(response).into_response()
        }
        Err(err) => {
            let request_id = extract_or_generate_request_id(headers);
            record_pipeline_error(label, &err);
            from_lib_error(&err, request_id.as_str()).into_response()
        }
    }
}

async fn time(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    dispatch(&state, "time", &method, &uri, &headers, Endpoint::Time).await
}

async fn locations_by_type(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path(KeyPath { key }): Path<KeyPath>,
) -> Response {
    let endpoint = Endpoint::LocationsByType { kind: key };
    dispatch(&state, "locations", &method, &uri, &headers, endpoint).await
}

async fn kingdoms(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    dispatch(&state, "kingdoms", &method, &uri, &headers, Endpoint::Kingdoms).await
}

async fn kingdom_size(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path(IdPath { id }): Path<IdPath>,
) -> Response {
    let endpoint = Endpoint::KingdomSize { id };
    dispatch(&state, "kingdom_size", &method, &uri, &headers, endpoint).await
}

async fn kingdom_castles(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path(IdPath { id }): Path<IdPath>,
) -> Response {
    let endpoint = Endpoint::KingdomCastles { id };
    dispatch(&state, "kingdom_castles", &method, &uri, &headers, endpoint).await
}

async fn kingdom_summary(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path(IdPath { id }): Path<IdPath>,
) -> Response {
    summary(&state, "kingdoms", id, &method, &uri, &headers).await
}

async fn location_summary(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path(KeyPath { key }): Path<KeyPath>,
) -> Response {
    summary(&state, "locations", key, &method, &uri, &headers).await
}

async fn summary(
    state: &AppState,
    table: &'static str,
    id: String,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
) -> Response {
    let label = match table {
        "kingdoms" => "kingdom_summary",
        _ => "location_summary",
    };
    let endpoint = Endpoint::Summary {
        table: table.to_string(),
        id,
    };
    dispatch(state, label, method, uri, headers, endpoint).await
}
