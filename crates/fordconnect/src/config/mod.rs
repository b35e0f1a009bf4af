//! Configuration management for fordconnect.
//!
//! This module provides configuration loading and validation using figment,
//! supporting a YAML config file with `!secret` references, environment
//! variables, and defaults.

pub mod secrets;

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::trip::EXTENDED_RANGE_KWH;
use crate::units::UnitSystem;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "fordconnect.yaml";

/// Default config directory name.
const CONFIG_DIR_NAME: &str = "fordconnect";

/// Prefix for environment overrides, e.g.
/// `FORDCONNECT_FORDCONNECT__VEHICLE__VIN`.
const ENV_PREFIX: &str = "FORDCONNECT_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FORDCONNECT_`, nested with `__`)
/// 2. YAML config file at `~/.config/fordconnect/fordconnect.yaml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Vehicle and polling configuration.
    pub fordconnect: FordConnectConfig,
    /// Reverse geocoding.
    pub geocodio: GeocodioConfig,
    /// ABRP telemetry.
    pub abrp: AbrpConfig,
    /// Log file output.
    pub log: LogConfig,
}

/// Vehicle and polling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FordConnectConfig {
    /// FordPass account and vehicle.
    pub vehicle: VehicleConfig,
    /// Usable battery capacity in kWh (68 standard range, 88 extended).
    pub battery_capacity_kwh: f64,
    /// Display units.
    pub units: UnitSystem,
    /// Seconds between status polls.
    pub poll_interval_secs: u64,
    /// Number of polls before exiting. 0 runs until interrupted.
    pub iterations: u32,
    /// Retry policy for vehicle API calls.
    pub retry: RetryPolicy,
}

/// FordPass account and vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// FordPass username.
    pub username: Option<String>,
    /// FordPass password.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Vehicle identification number.
    pub vin: Option<String>,
    /// Friendly name used in log lines.
    pub name: Option<String>,
}

/// geocod.io settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodioConfig {
    /// Reverse geocode changed positions.
    pub enable: bool,
    /// geocod.io API key.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

/// ABRP settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbrpConfig {
    /// Post telemetry on every update.
    pub enable: bool,
    /// ABRP API key.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// ABRP user token.
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

/// Log file settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Directory for daily log files. No file is written when unset.
    pub directory: Option<PathBuf>,
}

impl Default for FordConnectConfig {
    fn default() -> Self {
        Self {
            vehicle: VehicleConfig::default(),
            battery_capacity_kwh: EXTENDED_RANGE_KWH,
            units: UnitSystem::default(),
            poll_interval_secs: 30,
            iterations: 0,
            retry: RetryPolicy::default(),
        }
    }
}

/// Credentials needed to talk to FordPass.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// FordPass username.
    pub username: String,
    /// FordPass password.
    pub password: String,
    /// Vehicle identification number.
    pub vin: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .field("vin", &self.vin)
            .finish()
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a secret cannot be
    /// resolved, or the merged configuration is invalid.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if config_file.is_file() {
            let resolved = secrets::load_resolved(&config_file)?;
            let text = serde_yaml::to_string(&resolved).map_err(|source| Error::Yaml {
                path: config_file.clone(),
                source,
            })?;
            figment = figment.merge(Yaml::string(&text));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// Vehicle credentials are checked separately by [`Config::credentials`]
    /// so commands that never reach FordPass can run without them.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let fc = &self.fordconnect;
        if fc.poll_interval_secs == 0 {
            return Err(Error::config("poll_interval_secs must be greater than 0"));
        }
        if fc.retry.max_attempts == 0 {
            return Err(Error::config("retry.max_attempts must be greater than 0"));
        }
        if !fc.battery_capacity_kwh.is_finite() || fc.battery_capacity_kwh <= 0.0 {
            return Err(Error::config(format!(
                "battery_capacity_kwh must be positive, got {}",
                fc.battery_capacity_kwh
            )));
        }

        if self.geocodio.enable && is_blank(self.geocodio.api_key.as_deref()) {
            return Err(Error::config(
                "Missing required 'api_key' option in 'geocodio' settings",
            ));
        }
        if self.abrp.enable {
            for (key, value) in [("api_key", &self.abrp.api_key), ("token", &self.abrp.token)] {
                if is_blank(value.as_deref()) {
                    return Err(Error::config(format!(
                        "Missing required '{key}' option in 'abrp' settings"
                    )));
                }
            }
        }
        Ok(())
    }

    /// The FordPass credentials.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing vehicle key.
    pub fn credentials(&self) -> Result<Credentials> {
        let vehicle = &self.fordconnect.vehicle;
        let require = |key: &str, value: &Option<String>| match value.as_deref() {
            Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
            _ => Err(Error::config(format!(
                "Missing required '{key}' option in 'fordconnect.vehicle' settings"
            ))),
        };
        Ok(Credentials {
            username: require("username", &vehicle.username)?,
            password: require("password", &vehicle.password)?,
            vin: require("vin", &vehicle.vin)?,
        })
    }

    /// Name for the vehicle in log lines, falling back to the VIN.
    #[must_use]
    pub fn vehicle_name(&self) -> String {
        let vehicle = &self.fordconnect.vehicle;
        vehicle
            .name
            .clone()
            .or_else(|| vehicle.vin.clone())
            .unwrap_or_else(|| "vehicle".to_string())
    }

    /// Get the poll interval as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.fordconnect.poll_interval_secs)
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}
