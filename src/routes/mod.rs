//! HTTP routes for the locator

pub mod health;
pub mod locations;
pub mod search;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::{error, warn};

use crate::types::LocatorError;

pub use health::health_check;
pub use locations::handle_locations;
pub use search::handle_search;

/// JSON response with CORS and no-store headers
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(bytes) => with_headers(status, Bytes::from(bytes)),
        Err(e) => {
            error!(error = %e, "Failed to serialize response body");
            with_headers(
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(br#"{"error":"INTERNAL_ERROR","message":"serialization failed"}"#),
            )
        }
    }
}

/// JSON error body: `{error, message}`
pub fn error_response(err: &LocatorError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    if status.is_server_error() {
        warn!(code = err.code(), error = %err, "Request failed");
    }
    let body = serde_json::json!({
        "error": err.code(),
        "message": err.to_string(),
    });
    json_response(status, &body)
}

fn with_headers(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
