//! Reverse geocoding through geocod.io.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Error, Result};

const SERVICE: &str = "geocod.io";

/// Default reverse geocoding endpoint.
pub const DEFAULT_GEOCODIO_URL: &str = "https://api.geocod.io/v1.7/reverse";

/// Placeholder for address parts the geocoder did not return.
const UNKNOWN: &str = "???";

/// Turns a position into an address.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Reverse geocode (`latitude`, `longitude`).
    ///
    /// # Errors
    ///
    /// Returns an error if the service fails or finds nothing.
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Address>;
}

/// Parts of an address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AddressComponents {
    /// Number and street, e.g. `1 Main St`.
    pub formatted_street: Option<String>,
    /// City or town.
    pub city: Option<String>,
    /// State abbreviation.
    pub state: Option<String>,
    /// Postal code.
    pub zip: Option<String>,
}

/// Best reverse geocoding match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Address {
    /// Full single-line address.
    pub formatted_address: Option<String>,
    /// Structured parts.
    pub address_components: AddressComponents,
}

impl Address {
    /// `'street, city'`, with `???` standing in for missing parts.
    #[must_use]
    pub fn street_town(&self) -> String {
        let parts = &self.address_components;
        format!(
            "'{}, {}'",
            parts.formatted_street.as_deref().unwrap_or(UNKNOWN),
            parts.city.as_deref().unwrap_or(UNKNOWN)
        )
    }
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    results: Vec<Address>,
}

/// Take the first result out of a geocod.io reverse response.
///
/// # Errors
///
/// Returns an error if the response is malformed or has no results.
pub fn parse_reverse(body: serde_json::Value) -> Result<Address> {
    let response: ReverseResponse =
        serde_json::from_value(body).map_err(|e| Error::unexpected(SERVICE, e.to_string()))?;
    response
        .results
        .into_iter()
        .next()
        .ok_or_else(|| Error::unexpected(SERVICE, "no results"))
}

/// HTTP client for geocod.io.
#[derive(Debug, Clone)]
pub struct GeocodioClient {
    http: reqwest::Client,
    api_key: String,
    url: String,
}

impl GeocodioClient {
    /// Create a client using `api_key`.
    #[must_use]
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self::with_url(http, api_key, DEFAULT_GEOCODIO_URL)
    }

    /// Create a client against a custom endpoint.
    #[must_use]
    pub fn with_url(
        http: reqwest::Client,
        api_key: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Geocoder for GeocodioClient {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Address> {
        let body: serde_json::Value = self
            .http
            .get(&self.url)
            .query(&[
                ("q", format!("{latitude},{longitude}")),
                ("api_key", self.api_key.clone()),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::from_reqwest(SERVICE, e))?
            .json()
            .await
            .map_err(|e| Error::from_reqwest(SERVICE, e))?;
        parse_reverse(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::serve_once;

    #[test]
    fn test_parse_reverse_first_result() {
        let body = serde_json::json!({
            "results": [
                {
                    "address_components": {
                        "number": "1",
                        "street": "Main",
                        "formatted_street": "Main St",
                        "city": "Geneva",
                        "state": "NY",
                        "zip": "14456"
                    },
                    "formatted_address": "1 Main St, Geneva, NY 14456",
                    "accuracy": 1
                },
                {
                    "address_components": {"formatted_street": "Other Rd", "city": "Elsewhere"}
                }
            ]
        });
        let address = parse_reverse(body).unwrap();
        assert_eq!(address.street_town(), "'Main St, Geneva'");
        assert_eq!(address.address_components.zip.as_deref(), Some("14456"));
    }

    #[test]
    fn test_street_town_missing_parts() {
        let address = Address::default();
        assert_eq!(address.street_town(), "'???, ???'");
    }

    #[test]
    fn test_parse_reverse_no_results() {
        let err = parse_reverse(serde_json::json!({"results": []})).unwrap_err();
        assert!(err.to_string().contains("no results"));
    }

    #[tokio::test]
    async fn test_reverse_over_http() {
        let body = r#"{"results": [{"address_components":
            {"formatted_street": "Main St", "city": "Geneva", "state": "NY"}}]}"#;
        let (base, server) = serve_once(200, body).await;
        let client = GeocodioClient::with_url(reqwest::Client::new(), "key", base);

        let address = client.reverse(42.955, -76.921).await.unwrap();
        assert_eq!(address.street_town(), "'Main St, Geneva'");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /?q=42.955%2C-76.921&api_key=key "));
    }

    #[tokio::test]
    async fn test_reverse_server_error() {
        let (base, server) = serve_once(500, r#"{"error": "boom"}"#).await;
        let client = GeocodioClient::with_url(reqwest::Client::new(), "key", base);

        let result = client.reverse(42.955, -76.921).await;
        assert!(matches!(
            result,
            Err(Error::HttpStatus {
                service: SERVICE,
                status: 500
            })
        ));
        server.await.unwrap();
    }
}
