//! Successful pipeline responses as HTTP responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use atlas_lib::PipelineResponse;

/// Header reporting whether the body came from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// JSON body produced by the pipeline, with its cache status.
#[derive(Debug, Clone)]
pub struct ServiceResponse(pub PipelineResponse);

impl From<PipelineResponse> for ServiceResponse {
    fn from(response: PipelineResponse) -> Self {
        Self(response)
    }
}

impl IntoResponse for ServiceResponse {
    fn into_response(self) -> Response {
        let PipelineResponse {
            status,
            body,
            cache,
            ..
        } = self.0;
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = (status, body).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            CACHE_STATUS_HEADER,
            HeaderValue::from_static(cache.as_str()),
        );
        response
    }
}
