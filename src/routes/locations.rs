//! `GET /v1/locations?state=&q=`

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{error_response, json_response};
use crate::model::CanonicalLocation;
use crate::server::AppState;
use crate::store::ListFilter;
use crate::types::{LocatorError, Result};

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    state: Option<String>,
    q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LocationList {
    pub count: usize,
    pub locations: Vec<CanonicalLocation>,
}

pub async fn list(state: &AppState, raw_query: &str) -> Result<LocationList> {
    let params: ListParams = serde_urlencoded::from_str(raw_query)
        .map_err(|e| LocatorError::BadRequest(format!("Malformed query string: {}", e)))?;
    let filter = ListFilter::new(params.state, params.q);
    let locations = state.store.list(&filter).await?;
    Ok(LocationList {
        count: locations.len(),
        locations,
    })
}

pub async fn handle_locations(state: &AppState, raw_query: &str) -> Response<Full<Bytes>> {
    match list(state, raw_query).await {
        Ok(body) => json_response(StatusCode::OK, &body),
        Err(e) => error_response(&e),
    }
}
