//! Elevation lookups against the USGS Elevation Point Query Service.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

const SERVICE: &str = "USGS elevation service";

/// Default EPQS endpoint.
pub const DEFAULT_USGS_URL: &str = "https://nationalmap.gov/epqs/pqs.php";

/// Something that can tell the ground elevation at a position.
#[async_trait]
pub trait ElevationLookup: Send + Sync {
    /// Elevation in meters at (`latitude`, `longitude`).
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be reached or has no data.
    async fn elevation_m(&self, latitude: f64, longitude: f64) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
struct EpqsResponse {
    #[serde(rename = "USGS_Elevation_Point_Query_Service")]
    service: EpqsService,
}

#[derive(Debug, Deserialize)]
struct EpqsService {
    #[serde(rename = "Elevation_Query")]
    query: EpqsQuery,
}

#[derive(Debug, Deserialize)]
struct EpqsQuery {
    #[serde(rename = "Elevation")]
    elevation: crate::snapshot::Number,
}

/// Pull the elevation out of an EPQS JSON response.
///
/// # Errors
///
/// Returns an error if the document does not carry an elevation. EPQS reports
/// points outside its coverage as `-1000000`, which is also treated as missing.
pub fn parse_epqs(body: serde_json::Value) -> Result<f64> {
    let response: EpqsResponse = serde_json::from_value(body)
        .map_err(|e| Error::unexpected(SERVICE, e.to_string()))?;
    let elevation = response.service.query.elevation.0;
    if elevation <= -1_000_000.0 {
        return Err(Error::unexpected(SERVICE, "position outside coverage"));
    }
    Ok(elevation)
}

/// HTTP client for the USGS service.
#[derive(Debug, Clone)]
pub struct UsgsElevation {
    http: reqwest::Client,
    url: String,
}

impl UsgsElevation {
    /// Create a client against the default endpoint.
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_url(http, DEFAULT_USGS_URL)
    }

    /// Create a client against a custom endpoint.
    #[must_use]
    pub fn with_url(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ElevationLookup for UsgsElevation {
    async fn elevation_m(&self, latitude: f64, longitude: f64) -> Result<f64> {
        let query = [
            ("x", longitude.to_string()),
            ("y", latitude.to_string()),
            ("units", "Meters".to_string()),
            ("output", "json".to_string()),
        ];
        let body: serde_json::Value = self
            .http
            .get(&self.url)
            .query(&query)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::from_reqwest(SERVICE, e))?
            .json()
            .await
            .map_err(|e| Error::from_reqwest(SERVICE, e))?;

        let elevation = parse_epqs(body)?;
        debug!("Elevation at ({latitude:.4}, {longitude:.4}) is {elevation:.1} m");
        Ok(elevation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::serve_once;

    #[test]
    fn test_parse_epqs() {
        let body = serde_json::json!({
            "USGS_Elevation_Point_Query_Service": {
                "Elevation_Query": {
                    "x": -76.921108,
                    "y": 42.955701,
                    "Data_Source": "3DEP 1/3 arc-second",
                    "Elevation": 187.52,
                    "Units": "Meters"
                }
            }
        });
        assert!((parse_epqs(body).unwrap() - 187.52).abs() < 1e-9);
    }

    #[test]
    fn test_parse_epqs_string_elevation() {
        let body = serde_json::json!({
            "USGS_Elevation_Point_Query_Service": {
                "Elevation_Query": {"Elevation": "201.3"}
            }
        });
        assert!((parse_epqs(body).unwrap() - 201.3).abs() < 1e-9);
    }

    #[test]
    fn test_parse_epqs_no_data() {
        let body = serde_json::json!({
            "USGS_Elevation_Point_Query_Service": {
                "Elevation_Query": {"Elevation": -1_000_000}
            }
        });
        assert!(parse_epqs(body).is_err());
    }

    #[test]
    fn test_parse_epqs_malformed() {
        let err = parse_epqs(serde_json::json!({"error": "bad"})).unwrap_err();
        assert!(err.to_string().contains(SERVICE));
    }

    #[tokio::test]
    async fn test_elevation_over_http() {
        let body = r#"{"USGS_Elevation_Point_Query_Service":
            {"Elevation_Query": {"Elevation": 187.52, "Units": "Meters"}}}"#;
        let (base, server) = serve_once(200, body).await;
        let usgs = UsgsElevation::with_url(reqwest::Client::new(), format!("{base}epqs/pqs.php"));

        let meters = usgs.elevation_m(42.955, -76.921).await.unwrap();
        assert!((meters - 187.52).abs() < 1e-9);

        let request = server.await.unwrap();
        assert!(request
            .starts_with("GET /epqs/pqs.php?x=-76.921&y=42.955&units=Meters&output=json "));
    }

    #[tokio::test]
    async fn test_elevation_not_found() {
        let (base, server) = serve_once(404, "{}").await;
        let usgs = UsgsElevation::with_url(reqwest::Client::new(), base);

        let result = usgs.elevation_m(42.955, -76.921).await;
        assert!(matches!(result, Err(Error::HttpStatus { status: 404, .. })));
        server.await.unwrap();
    }
}
