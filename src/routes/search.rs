//! `GET /v1/search`
//!
//! Origin is either `lat`+`lng` or a free-text `address` geocoded through the
//! shared client. `radius_km=0` searches without a distance bound.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{error_response, json_response};
use crate::model::{Coordinates, SearchResult};
use crate::proximity::ProximityQuery;
use crate::server::AppState;
use crate::types::{LocatorError, Result};

pub const DEFAULT_RADIUS_KM: f64 = 75.0;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.55;
pub const DEFAULT_LIMIT: usize = 20;

/// Raw query string; every value is parsed by hand so bad input is a 400
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub lat: Option<String>,
    pub lng: Option<String>,
    pub address: Option<String>,
    pub radius_km: Option<String>,
    pub min_conf: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl SearchParams {
    pub fn parse(raw_query: &str) -> Result<Self> {
        serde_urlencoded::from_str(raw_query)
            .map_err(|e| LocatorError::BadRequest(format!("Malformed query string: {}", e)))
    }
}

/// Echo of the interpreted query
#[derive(Debug, Serialize)]
pub struct QueryEcho {
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// `null` when unbounded
    pub radius_km: Option<f64>,
    pub min_conf: f64,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Serialize)]
pub struct SearchRow {
    pub id: String,
    pub name: String,
    pub kind: &'static str,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub distance_m: u64,
    pub confidence: f64,
}

impl From<SearchResult> for SearchRow {
    fn from(result: SearchResult) -> Self {
        let l = result.location;
        Self {
            kind: l.kind.as_str(),
            id: l.id,
            name: l.name,
            phone: l.phone,
            website: l.website,
            city: l.city,
            state: l.state,
            postal_code: l.postal_code,
            lat: l.latitude,
            lng: l.longitude,
            distance_m: result.distance_meters,
            confidence: l.confidence,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: QueryEcho,
    pub count: usize,
    pub results: Vec<SearchRow>,
}

fn number<T: FromStr>(name: &str, value: Option<&str>, default: T) -> Result<T> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| LocatorError::BadRequest(format!("{} must be a number, got {:?}", name, v))),
    }
}

/// Where the search starts
async fn origin(state: &AppState, params: &SearchParams) -> Result<(Coordinates, Option<String>)> {
    let lat = params.lat.as_deref().map(str::trim).filter(|v| !v.is_empty());
    let lng = params.lng.as_deref().map(str::trim).filter(|v| !v.is_empty());

    match (lat, lng) {
        (Some(_), Some(_)) => {
            let latitude: f64 = number("lat", lat, f64::NAN)?;
            let longitude: f64 = number("lng", lng, f64::NAN)?;
            Ok((Coordinates::new(latitude, longitude), None))
        }
        (Some(_), None) | (None, Some(_)) => Err(LocatorError::BadRequest(
            "lat and lng must be given together".into(),
        )),
        (None, None) => {
            let address = params
                .address
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .ok_or_else(|| LocatorError::BadRequest("lat and lng, or address, are required".into()))?;
            let coordinates = state.geocoder.resolve(address).await.ok_or_else(|| {
                LocatorError::NotFound(format!("Could not locate address {:?}", address))
            })?;
            Ok((coordinates, Some(address.to_string())))
        }
    }
}

/// Parse, validate and run one search
pub async fn search(state: &AppState, raw_query: &str) -> Result<SearchResponse> {
    let params = SearchParams::parse(raw_query)?;

    let radius_km: f64 = number("radius_km", params.radius_km.as_deref(), DEFAULT_RADIUS_KM)?;
    let min_conf: f64 = number("min_conf", params.min_conf.as_deref(), DEFAULT_MIN_CONFIDENCE)?;
    let limit: usize = number("limit", params.limit.as_deref(), DEFAULT_LIMIT)?;
    let offset: usize = number("offset", params.offset.as_deref(), 0)?;
    let (origin, address) = origin(state, &params).await?;

    let radius_meters = (radius_km != 0.0).then_some(radius_km * 1000.0);
    let query = ProximityQuery::new(origin, radius_meters, min_conf, limit, offset)?;
    let results = state.proximity.search_query(&query).await?;

    Ok(SearchResponse {
        query: QueryEcho {
            lat: origin.latitude,
            lng: origin.longitude,
            address,
            radius_km: query.radius_meters.map(|m| m / 1000.0),
            min_conf: query.min_confidence,
            limit: query.limit,
            offset: query.offset,
        },
        count: results.len(),
        results: results.into_iter().map(SearchRow::from).collect(),
    })
}

pub async fn handle_search(state: &AppState, raw_query: &str) -> Response<Full<Bytes>> {
    match search(state, raw_query).await {
        Ok(response) => json_response(StatusCode::OK, &response),
        Err(e) => error_response(&e),
    }
}
