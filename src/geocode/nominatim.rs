//! Remote geocoding transport
//!
//! [`GeocodeTransport`] is the seam between the caching client and the
//! network. [`NominatimTransport`] speaks the Nominatim search API
//! (`/search?format=json&limit=1&q=...`).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::model::Coordinates;

/// Result of a single remote lookup
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// Best match; components may still be non-finite
    Found(Coordinates),
    /// The service answered but had no match
    NotFound,
    /// The service asked us to slow down (HTTP 429)
    RateLimited,
    /// Network error, unexpected status, or malformed payload
    Failed(String),
}

/// One remote lookup per call, no caching and no retry
#[async_trait]
pub trait GeocodeTransport: Send + Sync {
    async fn lookup(&self, query: &str) -> LookupOutcome;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Configuration for the Nominatim transport
#[derive(Debug, Clone)]
pub struct NominatimConfig {
    /// Search endpoint, e.g. `https://nominatim.openstreetmap.org/search`
    pub base_url: String,
    /// Courtesy contact sent with every request
    pub email: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub accept_language: String,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org/search".to_string(),
            email: "locator@example.org".to_string(),
            user_agent: "locator/0.1 (farm and pickup finder)".to_string(),
            request_timeout: Duration::from_secs(10),
            accept_language: "en".to_string(),
        }
    }
}

/// Nominatim returns coordinates as strings; some mirrors use numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Degrees {
    Text(String),
    Number(f64),
}

impl Degrees {
    fn parse(&self) -> Option<f64> {
        match self {
            Self::Text(text) => text.trim().parse().ok(),
            Self::Number(value) => Some(*value),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: Degrees,
    lon: Degrees,
}

/// HTTP transport for Nominatim-compatible services
pub struct NominatimTransport {
    config: NominatimConfig,
    http_client: reqwest::Client,
}

impl NominatimTransport {
    pub fn new(config: NominatimConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_default();

        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &NominatimConfig {
        &self.config
    }
}

#[async_trait]
impl GeocodeTransport for NominatimTransport {
    async fn lookup(&self, query: &str) -> LookupOutcome {
        let response = self
            .http_client
            .get(&self.config.base_url)
            .query(&[
                ("format", "json"),
                ("limit", "1"),
                ("email", self.config.email.as_str()),
                ("q", query),
            ])
            .header(reqwest::header::ACCEPT_LANGUAGE, &self.config.accept_language)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => return LookupOutcome::Failed(e.to_string()),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return LookupOutcome::RateLimited;
        }
        if !status.is_success() {
            return LookupOutcome::Failed(format!("HTTP {}", status));
        }

        match response.json::<Vec<Place>>().await {
            Ok(places) => outcome_from_places(&places),
            Err(e) => {
                debug!(query = %query, error = %e, "Malformed geocoder payload");
                LookupOutcome::Failed(format!("malformed payload: {}", e))
            }
        }
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

fn outcome_from_places(places: &[Place]) -> LookupOutcome {
    let Some(best) = places.first() else {
        return LookupOutcome::NotFound;
    };
    match (best.lat.parse(), best.lon.parse()) {
        (Some(latitude), Some(longitude)) => {
            LookupOutcome::Found(Coordinates::new(latitude, longitude))
        }
        _ => LookupOutcome::Failed("unparseable coordinates".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> LookupOutcome {
        let places: Vec<Place> = serde_json::from_str(body).unwrap();
        outcome_from_places(&places)
    }

    #[test]
    fn test_takes_first_match_only() {
        let outcome = parse(
            r#"[{"lat":"42.3601","lon":"-71.0589","display_name":"Boston"},
                {"lat":"1.0","lon":"2.0"}]"#,
        );
        assert_eq!(outcome, LookupOutcome::Found(Coordinates::new(42.3601, -71.0589)));
    }

    #[test]
    fn test_numeric_coordinates_accepted() {
        let outcome = parse(r#"[{"lat":44.19,"lon":-72.5}]"#);
        assert_eq!(outcome, LookupOutcome::Found(Coordinates::new(44.19, -72.5)));
    }

    #[test]
    fn test_empty_is_not_found() {
        assert_eq!(parse("[]"), LookupOutcome::NotFound);
    }

    #[test]
    fn test_garbage_coordinates_fail() {
        assert!(matches!(
            parse(r#"[{"lat":"north","lon":"-71"}]"#),
            LookupOutcome::Failed(_)
        ));
    }

    #[test]
    fn test_default_config_identifies_client() {
        let config = NominatimConfig::default();
        assert!(config.user_agent.starts_with("locator/"));
        assert!(!config.email.is_empty());
    }
}
