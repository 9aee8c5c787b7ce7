//! hyper server loop and request routing

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use super::AppState;
use crate::routes::{self, error_response, json_response};
use crate::types::{LocatorError, Result};

/// Serve until the process exits
pub async fn run(state: Arc<AppState>, listen: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(listen).await?;
    info!(
        %listen,
        mode = state.store.mode().as_str(),
        backend = state.proximity.backend_name(),
        "Locator listening"
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        debug!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route one request under the request timeout
///
/// No route reads a body, so any body type is accepted.
pub async fn handle_request<B>(
    state: Arc<AppState>,
    req: Request<B>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();
    let started = Instant::now();

    let response = match tokio::time::timeout(
        state.request_timeout,
        route(&state, method.clone(), &path, &query),
    )
    .await
    {
        Ok(response) => response,
        Err(elapsed) => error_response(&LocatorError::from(elapsed)),
    };

    info!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Request"
    );
    Ok(response)
}

async fn route(state: &AppState, method: Method, path: &str, query: &str) -> Response<Full<Bytes>> {
    match (method, path) {
        (Method::OPTIONS, _) => preflight_response(),
        (Method::GET, "/health") | (Method::GET, "/healthz") => routes::health_check(state).await,
        (Method::GET, "/v1/search") => routes::handle_search(state, query).await,
        (Method::GET, "/v1/locations") => routes::handle_locations(state, query).await,
        _ => not_found_response(path),
    }
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    let headers = response.headers_mut();
    headers.insert(
        hyper::header::ACCESS_CONTROL_ALLOW_ORIGIN,
        hyper::header::HeaderValue::from_static("*"),
    );
    headers.insert(
        hyper::header::ACCESS_CONTROL_ALLOW_HEADERS,
        hyper::header::HeaderValue::from_static("*"),
    );
    headers.insert(
        hyper::header::ACCESS_CONTROL_ALLOW_METHODS,
        hyper::header::HeaderValue::from_static("GET, OPTIONS"),
    );
    response
}

fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "NOT_FOUND",
        "path": path,
        "hint": "Try /v1/search, /v1/locations or /health",
    });
    json_response(StatusCode::NOT_FOUND, &body)
}
