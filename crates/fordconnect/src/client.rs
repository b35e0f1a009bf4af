//! FordPass Connect vehicle API client.
//!
//! Authentication is a password grant against Ford's SSO endpoint followed by
//! an exchange for a FordPass token. The token is cached until shortly before
//! it expires, and dropped whenever the API answers 401.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::journeys::{Journey, JourneyDetails};
use crate::snapshot::StatusSnapshot;

const SERVICE: &str = "FordPass";

const SSO_URL: &str = "https://sso.ci.ford.com/oidc/endpoint/default/token";
const TOKEN_URL: &str = "https://api.mps.ford.com/api/oauth2/v1/token";
const VEHICLES_URL: &str = "https://usapi.cv.ford.com/api/vehicles/v4";
const MPS_URL: &str = "https://api.mps.ford.com/api";

const CLIENT_ID: &str = "9fb503e0-715b-47e8-adfd-ad4b7770f73b";
const APPLICATION_ID: &str = "71A3AD0A-CF46-4CCF-B473-FC7FE5BC4592";
const CLIENT_VERSION: &str = "iOS3.29.0";
const USER_AGENT: &str = "fordpass-na/353 CFNetwork/1121.2.2 Darwin/19.3.0";

/// Refresh this long before the token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Operations against the vehicle telematics API.
#[async_trait]
pub trait VehicleApi: Send + Sync {
    /// Current vehicle status.
    async fn status(&self) -> Result<StatusSnapshot>;

    /// Recent charging sessions, as returned.
    async fn chargelogs(&self) -> Result<serde_json::Value>;

    /// Recent trips recorded by the vehicle, as returned.
    async fn triplogs(&self) -> Result<serde_json::Value>;

    /// Journeys that started between `start` and `end`.
    async fn journeys(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Journey>>;

    /// Full detail for journey `id`.
    async fn journey_details(&self, id: &str) -> Result<JourneyDetails>;

    /// State of the charge port, as returned.
    async fn plugstatus(&self) -> Result<serde_json::Value>;
}

#[derive(Debug, Clone)]
struct Token {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl Token {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct SsoResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    300
}

#[derive(Debug, Deserialize)]
struct Wrapped<T> {
    value: T,
}

/// Pull the status block out of a status response.
///
/// # Errors
///
/// Returns an error if there is no `vehiclestatus` object or it does not
/// have the expected shape.
pub fn parse_status(mut body: serde_json::Value) -> Result<StatusSnapshot> {
    match body.get_mut("vehiclestatus").map(serde_json::Value::take) {
        Some(status) if status.is_object() => StatusSnapshot::from_json(status),
        _ => Err(Error::unexpected(SERVICE, "no vehiclestatus in response")),
    }
}

/// Unwrap the `value` envelope used by the journey endpoints.
///
/// # Errors
///
/// Returns an error if the envelope or its contents are malformed.
pub fn parse_value<T: DeserializeOwned>(body: serde_json::Value) -> Result<T> {
    serde_json::from_value::<Wrapped<T>>(body)
        .map(|w| w.value)
        .map_err(|e| Error::unexpected(SERVICE, e.to_string()))
}

/// HTTP client for FordPass.
#[derive(Debug)]
pub struct FordPassClient {
    http: reqwest::Client,
    credentials: Credentials,
    token: Mutex<Option<Token>>,
}

impl FordPassClient {
    /// Create a client for the given account and vehicle.
    #[must_use]
    pub fn new(http: reqwest::Client, credentials: Credentials) -> Self {
        Self {
            http,
            credentials,
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.access_token.clone());
        }

        let token = self.authenticate().await?;
        let access = token.access_token.clone();
        *cached = Some(token);
        Ok(access)
    }

    async fn authenticate(&self) -> Result<Token> {
        debug!("Requesting FordPass token for {}", self.credentials.username);
        let form = [
            ("client_id", CLIENT_ID),
            ("grant_type", "password"),
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.as_str()),
        ];
        let sso: SsoResponse = self
            .http
            .post(SSO_URL)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .form(&form)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::from_reqwest(SERVICE, e))?
            .json()
            .await
            .map_err(|e| Error::from_reqwest(SERVICE, e))?;

        let exchanged: TokenResponse = self
            .http
            .put(TOKEN_URL)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header("Application-Id", APPLICATION_ID)
            .json(&serde_json::json!({ "code": sso.access_token }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::from_reqwest(SERVICE, e))?
            .json()
            .await
            .map_err(|e| Error::from_reqwest(SERVICE, e))?;

        info!("Authenticated with FordPass");
        Ok(Token {
            access_token: exchanged.access_token,
            expires_at: Utc::now() + Duration::seconds(exchanged.expires_in),
        })
    }

    /// Send an authenticated request and decode the JSON body.
    async fn send(&self, request: RequestBuilder) -> Result<serde_json::Value> {
        let token = self.access_token().await?;
        let result = request
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header("Application-Id", APPLICATION_ID)
            .header("auth-token", token)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::from_reqwest(SERVICE, e));

        let response = match result {
            Err(Error::HttpStatus { status: 401, .. }) => {
                debug!("FordPass token rejected, will re-authenticate");
                *self.token.lock().await = None;
                return Err(Error::HttpStatus {
                    service: SERVICE,
                    status: 401,
                });
            }
            other => other?,
        };
        response
            .json()
            .await
            .map_err(|e| Error::from_reqwest(SERVICE, e))
    }

    /// Journey listing request; the window is sent as epoch seconds.
    fn journeys_request(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> RequestBuilder {
        let url = format!("{MPS_URL}/journey-info/v1/journeys");
        let query = [
            ("startDate", start.timestamp().to_string()),
            ("endDate", end.timestamp().to_string()),
            ("vins", self.credentials.vin.clone()),
            ("countryCode", "USA".to_string()),
            ("clientVersion", CLIENT_VERSION.to_string()),
        ];
        self.http.get(url).query(&query)
    }

    async fn cevs(&self, kind: &str) -> Result<serde_json::Value> {
        let url = format!("{MPS_URL}/cevs/v1/{kind}/retrieve");
        let request = self
            .http
            .post(url)
            .json(&serde_json::json!({ "vin": self.credentials.vin }));
        self.send(request).await
    }
}

#[async_trait]
impl VehicleApi for FordPassClient {
    async fn status(&self) -> Result<StatusSnapshot> {
        let url = format!("{VEHICLES_URL}/{}/status", self.credentials.vin);
        let request = self
            .http
            .get(url)
            .query(&[("lrdt", "01-01-1970 00:00:00")]);
        parse_status(self.send(request).await?)
    }

    async fn chargelogs(&self) -> Result<serde_json::Value> {
        self.cevs("chargelogs").await
    }

    async fn triplogs(&self) -> Result<serde_json::Value> {
        self.cevs("triplogs").await
    }

    async fn journeys(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Journey>> {
        let body = self.send(self.journeys_request(start, end)).await?;
        parse_value(body)
    }

    async fn journey_details(&self, id: &str) -> Result<JourneyDetails> {
        let url = format!("{MPS_URL}/journey-info/v1/journey/details/{id}");
        let query = [
            ("vin", self.credentials.vin.as_str()),
            ("clientVersion", CLIENT_VERSION),
        ];
        let body = self.send(self.http.get(url).query(&query)).await?;
        parse_value(body)
    }

    async fn plugstatus(&self) -> Result<serde_json::Value> {
        let url = format!("{MPS_URL}/vpoi/chargestations/v3/plugstatus");
        let request = self.http.get(url).header("vin", self.credentials.vin.as_str());
        self.send(request).await
    }
}
