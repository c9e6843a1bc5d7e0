use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use crate::config::{AppConfig, ProviderKind};
use crate::errors::{GeoError, GeoResult};

/// Upper bound on one lookup attempt; a timed-out call burns one retry.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Final outcome of geocoding one distinct address. Produced at most once
/// per address per run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeocodeOutcome {
    Resolved(Coordinate),
    Unresolved,
}

impl GeocodeOutcome {
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            GeocodeOutcome::Resolved(coordinate) => Some(*coordinate),
            GeocodeOutcome::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, GeocodeOutcome::Resolved(_))
    }
}

/// One failed lookup attempt. `Ok(None)` from a client means the provider
/// answered and found nothing, which is terminal; an `Err` may be retried.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider returned status {0}")]
    Status(u16),
}

impl LookupError {
    /// Client-side rejections (bad key, bad request) won't change on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            LookupError::Transport(_) | LookupError::Timeout(_) => true,
            LookupError::Status(status) => *status == 429 || *status >= 500,
        }
    }
}

/// Single-address lookup. Implementations must tolerate concurrent calls
/// from multiple workers.
#[async_trait]
pub trait GeocodeClient: Send + Sync {
    async fn resolve(&self, address: &str) -> Result<Option<Coordinate>, LookupError>;
}

/// HTTP client for the Nominatim search API, which LocationIQ also speaks.
/// The provider variant is fixed at construction; only endpoint and key
/// differ between the two.
pub struct NominatimClient {
    http: Client,
    search_url: String,
    api_key: Option<SecretString>,
}

impl std::fmt::Debug for NominatimClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NominatimClient")
            .field("search_url", &self.search_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl NominatimClient {
    pub fn new(config: &AppConfig, kind: ProviderKind) -> GeoResult<Self> {
        let api_key = config.geocoder_api_key.clone();
        if kind.requires_api_key() && api_key.is_none() {
            return Err(GeoError::Config(format!(
                "provider {} requires GEOCODER_API_KEY",
                kind.as_tag()
            )));
        }

        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(LOOKUP_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            search_url: config
                .geocoder_base_url
                .clone()
                .unwrap_or_else(|| kind.default_base_url().to_string()),
            api_key,
        })
    }
}

#[async_trait]
impl GeocodeClient for NominatimClient {
    async fn resolve(&self, address: &str) -> Result<Option<Coordinate>, LookupError> {
        #[derive(Deserialize)]
        struct SearchHit {
            // Nominatim encodes coordinates as decimal strings.
            lat: String,
            lon: String,
        }

        let mut request = self
            .http
            .get(&self.search_url)
            .query(&[("q", address), ("format", "jsonv2"), ("limit", "1")]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.expose_secret())]);
        }

        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let hits: Vec<SearchHit> = response.json().await.map_err(classify_transport)?;
        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };

        let latitude = hit
            .lat
            .parse()
            .map_err(|_| LookupError::Transport(format!("malformed latitude: {}", hit.lat)))?;
        let longitude = hit
            .lon
            .parse()
            .map_err(|_| LookupError::Transport(format!("malformed longitude: {}", hit.lon)))?;

        Ok(Some(Coordinate {
            latitude,
            longitude,
        }))
    }
}

fn classify_transport(err: reqwest::Error) -> LookupError {
    if err.is_timeout() {
        LookupError::Timeout(LOOKUP_TIMEOUT)
    } else {
        LookupError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use httptest::matchers::{all_of, contains, request, url_decoded};
    use httptest::responders::{json_encoded, status_code};
    use httptest::{Expectation, Server};
    use serde_json::json;

    use super::*;

    fn client_for(server: &Server, kind: ProviderKind, key: Option<&str>) -> NominatimClient {
        let config = AppConfig {
            provider: kind.as_tag().into(),
            geocoder_base_url: Some(server.url("/search").to_string()),
            geocoder_api_key: key.map(|k| SecretString::from(k.to_string())),
            user_agent: "geozona-tests/0".into(),
        };
        NominatimClient::new(&config, kind).unwrap()
    }

    #[tokio::test]
    async fn parses_first_search_hit() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method("GET"),
                request::path("/search"),
                request::query(url_decoded(contains(("q", "Calle A 10, CiudadX"))))
            ])
            .respond_with(json_encoded(json!([
                { "lat": "20.0", "lon": "-100.0", "display_name": "Calle A 10" },
                { "lat": "99.0", "lon": "99.0", "display_name": "noise" }
            ]))),
        );

        let client = client_for(&server, ProviderKind::Nominatim, None);
        let hit = client.resolve("Calle A 10, CiudadX").await.unwrap().unwrap();
        assert_eq!(hit.latitude, 20.0);
        assert_eq!(hit.longitude, -100.0);
    }

    #[tokio::test]
    async fn empty_result_set_is_terminal_not_an_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/search"))
                .respond_with(json_encoded(json!([]))),
        );

        let client = client_for(&server, ProviderKind::Nominatim, None);
        assert!(client.resolve("nowhere").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn server_errors_are_retryable_client_errors_are_not() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/search"))
                .times(2)
                .respond_with(status_code(503)),
        );

        let client = client_for(&server, ProviderKind::Nominatim, None);
        let err = client.resolve("Calle A 10").await.unwrap_err();
        assert!(matches!(err, LookupError::Status(503)));
        assert!(err.is_retryable());

        let err = client.resolve("Calle A 10").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!LookupError::Status(403).is_retryable());
        assert!(LookupError::Status(429).is_retryable());
    }

    #[test]
    fn locationiq_without_key_fails_at_construction() {
        let config = AppConfig {
            provider: "locationiq".into(),
            geocoder_base_url: None,
            geocoder_api_key: None,
            user_agent: "geozona-tests/0".into(),
        };
        let err = NominatimClient::new(&config, ProviderKind::LocationIq).unwrap_err();
        assert!(matches!(err, GeoError::Config(_)));
    }
}
