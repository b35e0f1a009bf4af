//! A Better Routeplanner (ABRP) live telemetry.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::snapshot::StatusSnapshot;

const SERVICE: &str = "ABRP";

/// Default telemetry endpoint.
pub const DEFAULT_ABRP_URL: &str = "https://api.iternio.com/1/tlm/send";

/// Destination for vehicle telemetry.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Send the telemetry contained in `status`.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot lacks data or the post fails.
    async fn post(&self, status: &StatusSnapshot) -> Result<()>;
}

/// The telemetry record ABRP expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Telemetry {
    /// Seconds since the epoch.
    pub utc: i64,
    /// State of charge in percent.
    pub soc: f64,
    /// Odometer in km.
    pub odometer: f64,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
    /// 1 when the ignition is off.
    pub is_parked: u8,
    /// 1 while charging.
    pub is_charging: u8,
}

impl Telemetry {
    /// Build a record from a status snapshot taken at `utc`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state of charge, odometer or position is missing.
    pub fn from_snapshot(status: &StatusSnapshot, utc: i64) -> Result<Self> {
        let (lat, lon) = status.position().ok_or(Error::MissingField("gps"))?;
        Ok(Self {
            utc,
            soc: status
                .battery_fill_level()
                .ok_or(Error::MissingField("batteryFillLevel"))?,
            odometer: status
                .odometer_km()
                .ok_or(Error::MissingField("odometer"))?,
            lat,
            lon,
            is_parked: u8::from(status.is_ignition_off()),
            is_charging: u8::from(status.is_charging()),
        })
    }
}

/// HTTP client for the ABRP telemetry API.
#[derive(Debug)]
pub struct AbrpClient {
    http: reqwest::Client,
    api_key: String,
    token: String,
    url: String,
    last_data_time: AtomicI64,
}

impl AbrpClient {
    /// Create a client for the user identified by `token`.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        api_key: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self::with_url(http, api_key, token, DEFAULT_ABRP_URL)
    }

    /// Create a client posting to a custom endpoint.
    #[must_use]
    pub fn with_url(
        http: reqwest::Client,
        api_key: impl Into<String>,
        token: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            token: token.into(),
            url: url.into(),
            last_data_time: AtomicI64::new(0),
        }
    }

    /// Epoch seconds of the last accepted update, if any.
    #[must_use]
    pub fn last_data_time(&self) -> Option<i64> {
        match self.last_data_time.load(Ordering::SeqCst) {
            0 => None,
            t => Some(t),
        }
    }
}

#[async_trait]
impl TelemetrySink for AbrpClient {
    async fn post(&self, status: &StatusSnapshot) -> Result<()> {
        let telemetry = Telemetry::from_snapshot(status, Utc::now().timestamp())?;
        let tlm = serde_json::to_string(&telemetry)?;

        let response = self
            .http
            .get(&self.url)
            .query(&[
                ("token", self.token.as_str()),
                ("api_key", self.api_key.as_str()),
                ("tlm", tlm.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::from_reqwest(SERVICE, e))?;

        let code = response.status();
        if code == reqwest::StatusCode::OK {
            self.last_data_time
                .store(Utc::now().timestamp(), Ordering::SeqCst);
            debug!("ABRP telemetry update was successful");
            Ok(())
        } else {
            info!("ABRP telemetry update failed: {}", code.as_u16());
            Err(Error::HttpStatus {
                service: SERVICE,
                status: code.as_u16(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{fixtures, Reading};
    use crate::test_server::serve_once;

    #[test]
    fn test_telemetry_from_parked_snapshot() {
        let t = Telemetry::from_snapshot(&fixtures::parked(), 1_616_425_021).unwrap();
        assert_eq!(t.utc, 1_616_425_021);
        assert_eq!(t.soc, 80.0);
        assert_eq!(t.odometer, 1000.0);
        assert_eq!((t.lat, t.lon), (42.955, -76.921));
        assert_eq!(t.is_parked, 1);
        assert_eq!(t.is_charging, 0);
    }

    #[test]
    fn test_telemetry_driving_and_charging_flags() {
        let mut s = fixtures::parked();
        s.ignition_status = Some(Reading::new("Run".to_string()));
        let t = Telemetry::from_snapshot(&s, 0).unwrap();
        assert_eq!(t.is_parked, 0);

        s.ignition_status = Some(Reading::new("Off".to_string()));
        s.charging_status = Some(Reading::new("ChargingAC".to_string()));
        let t = Telemetry::from_snapshot(&s, 0).unwrap();
        assert_eq!((t.is_parked, t.is_charging), (1, 1));
    }

    #[test]
    fn test_telemetry_requires_position() {
        let mut s = fixtures::parked();
        s.gps = None;
        assert!(matches!(
            Telemetry::from_snapshot(&s, 0),
            Err(Error::MissingField("gps"))
        ));
    }

    #[test]
    fn test_telemetry_compact_json() {
        let t = Telemetry::from_snapshot(&fixtures::parked(), 10).unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.starts_with("{\"utc\":10,\"soc\":80.0,"));
        assert!(!json.contains(' '));
    }

    #[test]
    fn test_last_data_time_initially_none() {
        let client = AbrpClient::new(reqwest::Client::new(), "key", "token");
        assert!(client.last_data_time().is_none());
    }

    #[tokio::test]
    async fn test_post_accepted() {
        let (base, server) = serve_once(200, r#"{"status": "ok"}"#).await;
        let client =
            AbrpClient::with_url(reqwest::Client::new(), "key", "tok", format!("{base}tlm/send"));

        client.post(&fixtures::parked()).await.unwrap();
        assert!(client.last_data_time().is_some());

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /tlm/send?token=tok&api_key=key&tlm=%7B%22utc%22%3A"));
        assert!(request.contains("%22soc%22%3A80.0%2C%22odometer%22%3A1000.0"));
        assert!(request.contains("%22is_parked%22%3A1%2C%22is_charging%22%3A0%7D"));
    }

    #[tokio::test]
    async fn test_post_rejected() {
        let (base, server) = serve_once(500, r#"{"status": "error"}"#).await;
        let client = AbrpClient::with_url(reqwest::Client::new(), "key", "tok", base);

        let result = client.post(&fixtures::parked()).await;
        assert!(matches!(
            result,
            Err(Error::HttpStatus {
                service: "ABRP",
                status: 500
            })
        ));
        assert!(client.last_data_time().is_none());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_post_without_position_sends_nothing() {
        let mut s = fixtures::parked();
        s.gps = None;
        let client =
            AbrpClient::with_url(reqwest::Client::new(), "key", "tok", "http://127.0.0.1:9");
        assert!(matches!(client.post(&s).await, Err(Error::MissingField("gps"))));
        assert!(client.last_data_time().is_none());
    }
}
