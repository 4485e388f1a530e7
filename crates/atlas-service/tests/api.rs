use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use atlas_lib::{
    EntityId, LocationType, MemoryCache, PipelineSettings, PointOfInterestRow, RegionRow,
    RegionSizeRow, SpatialStore, StoreError, SummaryKind, SummaryRow,
};
use atlas_service::{app, app_with_cors, GREETING};
use atlas_service_shared::test_utils::{fixture_records, test_state};
use atlas_service_shared::{init_metrics, AppState, MetricsConfig};

fn server() -> TestServer {
    TestServer::new(app(test_state())).expect("build test server")
}

/// Store whose every query fails.
struct UnreachableStore;

fn unreachable() -> StoreError {
    StoreError::MalformedGeometry {
        gid: 0,
        reason: "connection reset".to_string(),
    }
}

#[async_trait]
impl SpatialStore for UnreachableStore {
    async fn current_time(&self) -> Result<DateTime<Utc>, StoreError> {
        Err(unreachable())
    }

    async fn locations_by_type(
        &self,
        _kind: LocationType,
    ) -> Result<Vec<PointOfInterestRow>, StoreError> {
        Err(unreachable())
    }

    async fn all_region_boundaries(&self) -> Result<Vec<RegionRow>, StoreError> {
        Err(unreachable())
    }

    async fn region_size(&self, _id: EntityId) -> Result<Option<RegionSizeRow>, StoreError> {
        Err(unreachable())
    }

    async fn poi_count_in_region(
        &self,
        _id: EntityId,
        _category: LocationType,
    ) -> Result<i64, StoreError> {
        Err(unreachable())
    }

    async fn summary(
        &self,
        _kind: SummaryKind,
        _id: EntityId,
    ) -> Result<Option<SummaryRow>, StoreError> {
        Err(unreachable())
    }

    fn backend(&self) -> &'static str {
        "unreachable"
    }
}

fn unreachable_store_server() -> TestServer {
    let state = AppState::from_components(
        Arc::new(UnreachableStore),
        Arc::new(MemoryCache::new()),
        PipelineSettings::default(),
    );
    TestServer::new(app(state)).expect("build test server")
}

fn cache_header(response: &axum_test::TestResponse) -> String {
    response
        .headers()
        .get("x-cache")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn root_returns_greeting() {
    let server = server();
    for path in ["/", "/api"] {
        let response = server.get(path).await;
        response.assert_status_ok();
        assert_eq!(response.text(), GREETING);
    }
}

#[tokio::test]
async fn time_is_never_cached() {
    let server = server();
    let response = server.get("/time").await;

    response.assert_status_ok();
    assert!(response.json::<Value>()["now"].is_string());
    assert_eq!(cache_header(&response), "BYPASS");
}

#[tokio::test]
async fn kingdoms_are_geojson_features() {
    let server = server();
    let response = server.get("/kingdoms").await;

    response.assert_status_ok();
    let body: Value = response.json();
    let features = body.as_array().expect("array body");
    assert_eq!(features.len(), fixture_records::KINGDOM_COUNT);
    assert_eq!(
        features[0]["properties"],
        json!({"name": "The North", "id": fixture_records::NORTH})
    );
    assert_eq!(features[2]["type"], "MultiPolygon");
}

#[tokio::test]
async fn repeated_request_is_served_from_cache() {
    let server = server();

    let first = server.get("/kingdoms/1/castles").await;
    let second = server.get("/kingdoms/1/castles").await;

    assert_eq!(cache_header(&first), "MISS");
    assert_eq!(cache_header(&second), "HIT");
    assert_eq!(first.text(), second.text());
    assert_eq!(second.json::<Value>(), json!({"count": 3}));
}

#[tokio::test]
async fn api_prefix_shares_the_cache_entry() {
    let server = server();

    let plain = server.get("/kingdoms/2/size").await;
    let prefixed = server.get("/api/kingdoms/2/size").await;

    assert_eq!(cache_header(&plain), "MISS");
    assert_eq!(cache_header(&prefixed), "HIT");
    assert_eq!(prefixed.json::<Value>(), json!({"id": 2, "size": 3.5}));
}

#[tokio::test]
async fn query_order_does_not_split_cache_entries() {
    let server = server();

    let first = server.get("/kingdoms?b=2&a=1").await;
    let second = server.get("/kingdoms?a=1&b=2").await;

    assert_eq!(cache_header(&first), "MISS");
    assert_eq!(cache_header(&second), "HIT");
}

#[tokio::test]
async fn kingdom_size_in_square_kilometers() {
    let server = server();
    let response = server.get("/kingdoms/1/size").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({"id": 1, "size": 2.0}));
}

#[tokio::test]
async fn locations_by_type_carry_stored_type() {
    let server = server();
    let response = server.get("/locations/castle").await;

    response.assert_status_ok();
    let body: Value = response.json();
    let features = body.as_array().expect("array body");
    assert_eq!(features.len(), 4);
    assert_eq!(
        features[0],
        json!({
            "type": "Point",
            "coordinates": [3, 7],
            "properties": {"name": "Winterfell", "type": "Castle", "id": fixture_records::WINTERFELL}
        })
    );
}

#[tokio::test]
async fn empty_category_is_an_empty_array() {
    let server = server();
    let response = server.get("/locations/region").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!([]));
}

#[tokio::test]
async fn summaries_for_kingdoms_and_locations() {
    let server = server();

    let kingdom = server.get("/kingdoms/3/summary").await;
    kingdom.assert_status_ok();
    assert_eq!(
        kingdom.json::<Value>()["url"],
        "https://atlas.example.org/wiki/Iron_Islands"
    );

    let location = server.get("/api/locations/7/summary").await;
    location.assert_status_ok();
    assert!(location.json::<Value>()["summary"]
        .as_str()
        .unwrap()
        .starts_with("Harrenhal"));
}

#[tokio::test]
async fn invalid_id_is_forbidden_with_conditions() {
    let server = server();
    let response = server
        .get("/kingdoms/1001/size")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("req-invalid-id"),
        )
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(
        response.headers()["content-type"],
        "application/problem+json"
    );
    let problem: Value = response.json();
    assert_eq!(problem["type"], "/problems/invalid-parameter");
    assert_eq!(problem["field"], "id");
    assert_eq!(problem["value"], "1001");
    assert_eq!(
        problem["message"],
        "ID taken in parameter doesn't respect the conditions"
    );
    assert_eq!(
        problem["conditions"],
        "Number between 0 and 1000, required field"
    );
    assert_eq!(problem["instance"], "req-invalid-id");
}

#[tokio::test]
async fn every_id_route_rejects_non_numeric_ids() {
    let server = server();
    for path in [
        "/kingdoms/abc/size",
        "/kingdoms/-3/castles",
        "/kingdoms/1.5/summary",
        "/locations/9999/summary",
        "/api/kingdoms/x/castles",
    ] {
        let response = server.get(path).await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN, "{path}");
        assert!(response.headers().get("x-cache").is_none(), "{path}");
    }
}

#[tokio::test]
async fn unknown_type_is_forbidden() {
    let server = server();
    let response = server.get("/locations/dragon").await;

    response.assert_status(StatusCode::FORBIDDEN);
    let problem: Value = response.json();
    assert_eq!(problem["field"], "type");
    assert_eq!(
        problem["conditions"],
        "Authorised values : 'castle', 'city', 'town', 'ruin', 'landmark', 'region'"
    );
}

#[tokio::test]
async fn unknown_kingdom_is_not_found() {
    let server = server();

    let size = server.get("/kingdoms/500/size").await;
    size.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(size.json::<Value>()["type"], "/problems/not-found");

    let summary = server.get("/locations/500/summary").await;
    summary.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let server = server();
    let response = server
        .get("/kingdoms")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("req-echo"),
        )
        .await;

    assert_eq!(response.headers()["x-request-id"], "req-echo");
}

#[tokio::test]
async fn health_endpoints_report_backends() {
    let server = server();

    server.get("/health/live").await.assert_status_ok();

    let ready = server.get("/health/ready").await;
    ready.assert_status_ok();
    let body: Value = ready.json();
    assert_eq!(body["store"], "memory");
    assert_eq!(body["cache"], "memory");
}

#[tokio::test]
async fn store_failure_is_an_internal_error_problem() {
    let server = unreachable_store_server();

    for path in ["/kingdoms", "/api/kingdoms/1/size", "/time"] {
        let response = server.get(path).await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()["content-type"],
            "application/problem+json",
            "{path}"
        );
        let problem: Value = response.json();
        assert_eq!(problem["type"], "/problems/internal-error", "{path}");
        assert_eq!(problem["status"], 500, "{path}");
    }

    let retried = server.get("/kingdoms").await;
    retried.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(retried.headers().get("x-cache").is_none());
}

#[tokio::test]
async fn readiness_fails_when_store_is_unreachable() {
    let server = unreachable_store_server();

    server.get("/health/live").await.assert_status_ok();
    let ready = server.get("/health/ready").await;
    ready.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert!(ready.json::<Value>()["status"]
        .as_str()
        .unwrap()
        .starts_with("not_ready"));
}

#[tokio::test]
async fn health_reports_service_name() {
    let server = server();
    let live: Value = server.get("/health/live").await.json();
    assert_eq!(live["service"], "atlas");
}

#[tokio::test]
async fn metrics_endpoint_responds() {
    let server = server();
    server.get("/metrics").await.assert_status_ok();
}

#[tokio::test]
async fn metric_labels_use_route_templates() {
    let _ = init_metrics(&MetricsConfig::default());
    let server = server();

    server.get("/locations/not-a-kind-7f3a").await;
    server.get("/kingdoms/oops-9c1e/size").await;
    server.get("/no/such/route-5d2b").await;

    let exposition = server.get("/metrics").await.text();
    assert!(exposition.contains(r#"path="/locations/{key}""#), "{exposition}");
    assert!(exposition.contains(r#"path="/kingdoms/{id}/size""#), "{exposition}");
    assert!(exposition.contains(r#"path="unmatched""#), "{exposition}");
    for raw in ["not-a-kind-7f3a", "oops-9c1e", "route-5d2b"] {
        assert!(!exposition.contains(raw), "raw path {raw} leaked into labels");
    }
}

#[tokio::test]
async fn cors_allows_configured_origin() {
    let router = app_with_cors(test_state(), "https://atlas.example.org").expect("valid origin");
    let server = TestServer::new(router).expect("build test server");

    let response = server
        .get("/kingdoms")
        .add_header(
            HeaderName::from_static("origin"),
            HeaderValue::from_static("https://atlas.example.org"),
        )
        .await;

    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://atlas.example.org"
    );
}

#[test]
fn cors_rejects_invalid_origin() {
    assert!(app_with_cors(test_state(), "bad\norigin").is_err());
}
