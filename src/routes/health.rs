//! Liveness probe
//!
//! `/health` answers `{ok, mode, locations}`; a store that cannot count its
//! locations makes the probe fail with 503.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::json_response;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    /// `file` or `db`
    pub mode: &'static str,
    pub locations: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn health(state: &AppState) -> HealthResponse {
    let mode = state.store.mode().as_str();
    match state.store.count().await {
        Ok(locations) => HealthResponse {
            ok: true,
            mode,
            locations,
            error: None,
        },
        Err(e) => HealthResponse {
            ok: false,
            mode,
            locations: 0,
            error: Some(e.to_string()),
        },
    }
}

pub async fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    let body = health(state).await;
    let status = if body.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(status, &body)
}
