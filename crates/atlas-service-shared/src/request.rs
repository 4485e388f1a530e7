//! Path parameters and conversion into pipeline requests.
//!
//! Parameters are captured as raw strings; the library validators decide what
//! is acceptable, so malformed values produce 403 problems instead of axum's
//! own extractor rejections.

use axum::http::{Method, Uri};
use serde::{Deserialize, Serialize};

use atlas_lib::{Endpoint, PipelineRequest};

/// `{id}` path segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdPath {
    pub id: String,
}

/// `{key}` path segment under `/locations`, either a type or an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPath {
    pub key: String,
}

/// Build a pipeline request from the HTTP method, URI and resolved endpoint.
pub fn pipeline_request(method: &Method, uri: &Uri, endpoint: Endpoint) -> PipelineRequest {
    PipelineRequest {
        method: method.as_str().to_string(),
        endpoint,
        query: uri.query().map(str::to_string),
    }
}
