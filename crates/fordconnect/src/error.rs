//! Error types for fordconnect.
//!
//! This module defines the error type shared by the vehicle, geocoding,
//! elevation and telemetry clients as well as the snapshot and trip logic.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for fordconnect operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// The YAML configuration or secrets file could not be parsed.
    #[error("failed to parse {path}: {source}")]
    Yaml {
        /// File being parsed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A `!secret` reference could not be resolved.
    #[error("secret '{name}' not defined")]
    SecretMissing {
        /// Name of the secret.
        name: String,
    },

    // === Remote API Errors ===
    /// The remote host could not be reached.
    #[error("{service} unavailable: {source}")]
    Connection {
        /// Which service failed.
        service: &'static str,
        /// The underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The remote API answered with an unexpected status.
    #[error("{service} returned HTTP {status}")]
    HttpStatus {
        /// Which service answered.
        service: &'static str,
        /// Status code of the response.
        status: u16,
    },

    /// An HTTP request failed for a reason other than connectivity.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// The response body did not have the expected shape.
    #[error("unexpected response from {service}: {message}")]
    UnexpectedResponse {
        /// Which service answered.
        service: &'static str,
        /// What was wrong with it.
        message: String,
    },

    // === Snapshot Errors ===
    /// A snapshot is missing a field needed for the computation.
    #[error("status snapshot is missing '{0}'")]
    MissingField(&'static str),

    /// A Ford timestamp could not be parsed.
    #[error("invalid timestamp '{0}'")]
    Timestamp(String),

    /// A trip window ends before it starts.
    #[error("trip ends at {end} before it starts at {start}")]
    TripOrder {
        /// Start of the window.
        start: String,
        /// End of the window.
        end: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for fordconnect operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Classify a reqwest error for the given service.
    ///
    /// Connect failures and timeouts become [`Error::Connection`] so the
    /// retry policy can pick them out; everything else is a plain HTTP error.
    #[must_use]
    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Connection {
                service,
                source: err,
            }
        } else if let Some(status) = err.status() {
            Self::HttpStatus {
                service,
                status: status.as_u16(),
            }
        } else {
            Self::Http(err)
        }
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create an unexpected response error.
    #[must_use]
    pub fn unexpected(service: &'static str, message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            service,
            message: message.into(),
        }
    }

    /// Check if this error means the remote host could not be reached.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Check if this error is a configuration problem.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad(_)
                | Self::ConfigValidation { .. }
                | Self::Yaml { .. }
                | Self::SecretMissing { .. }
        )
    }
}
