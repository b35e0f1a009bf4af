//! Typed vehicle status snapshots.
//!
//! FordPass returns the vehicle status as a nested JSON document where almost
//! every field is an object carrying a `value` plus `status`/`timestamp`
//! metadata. [`StatusSnapshot`] names the fields we care about; anything else
//! in the response is ignored.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Format of `lastModifiedDate` and per-field timestamps.
const FORD_TIME_FORMAT: &str = "%m-%d-%Y %H:%M:%S";
const FORD_TIME_FORMAT_FRACTIONAL: &str = "%m-%d-%Y %H:%M:%S%.f";

/// Ignition values that open a trip window.
const IGNITION_ON: [&str; 2] = ["Start", "Run"];

/// Ignition value that closes a trip window.
const IGNITION_OFF: &str = "Off";

/// A number the API sends either as a JSON number or as a numeric string.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Number(pub f64);

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Float(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Float(v) => Ok(Self(v)),
            Raw::Text(s) => s
                .trim()
                .parse()
                .map(Self)
                .map_err(|_| de::Error::custom(format!("expected a number, got '{s}'"))),
        }
    }
}

impl From<f64> for Number {
    fn from(v: f64) -> Self {
        Self(v)
    }
}

/// One reported value with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading<T> {
    /// The reported value; `null` in the response maps to `None`.
    #[serde(default)]
    pub value: Option<T>,
    /// Freshness flag, usually `CURRENT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// When the vehicle last reported this value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl<T> Reading<T> {
    /// A reading with only a value.
    pub fn new(value: T) -> Self {
        Self {
            value: Some(value),
            status: None,
            timestamp: None,
        }
    }
}

/// GPS block of the status response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gps {
    /// Latitude in degrees.
    pub latitude: Number,
    /// Longitude in degrees.
    pub longitude: Number,
    /// GPS fix state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_state: Option<String>,
    /// When the position was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// 12V battery block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Battery {
    /// Health as reported by the vehicle, e.g. `STATUS_GOOD`.
    pub battery_health: Option<Reading<String>>,
    /// Measured voltage.
    pub battery_status_actual: Option<Reading<Number>>,
}

/// Tire pressure monitoring block, pressures in kPa.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Tpms {
    /// Left front.
    pub left_front_tire_pressure: Option<Reading<Number>>,
    /// Right front.
    pub right_front_tire_pressure: Option<Reading<Number>>,
    /// Left rear.
    pub outer_left_rear_tire_pressure: Option<Reading<Number>>,
    /// Right rear.
    pub outer_right_rear_tire_pressure: Option<Reading<Number>>,
}

impl Tpms {
    /// The four pressures in LF, RF, LR, RR order, or `None` if any is missing.
    #[must_use]
    pub fn pressures_kpa(&self) -> Option<[f64; 4]> {
        let read = |r: &Option<Reading<Number>>| r.as_ref().and_then(|r| r.value).map(|n| n.0);
        Some([
            read(&self.left_front_tire_pressure)?,
            read(&self.right_front_tire_pressure)?,
            read(&self.outer_left_rear_tire_pressure)?,
            read(&self.outer_right_rear_tire_pressure)?,
        ])
    }
}

/// Door block.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DoorStatus {
    pub right_rear_door: Option<Reading<String>>,
    pub left_rear_door: Option<Reading<String>>,
    pub driver_door: Option<Reading<String>>,
    pub passenger_door: Option<Reading<String>>,
    pub hood_door: Option<Reading<String>>,
    pub tailgate_door: Option<Reading<String>>,
    pub inner_tailgate_door: Option<Reading<String>>,
}

/// Window block.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WindowPosition {
    pub driver_window_position: Option<Reading<String>>,
    pub pass_window_position: Option<Reading<String>>,
    pub rear_driver_window_pos: Option<Reading<String>>,
    pub rear_pass_window_pos: Option<Reading<String>>,
}

/// A single point-in-time vehicle status response.
///
/// Every field is optional: the API omits blocks the vehicle does not
/// support, and the accessors below surface the absence instead of
/// failing deserialization. Field names mirror the API.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub lock_status: Option<Reading<String>>,
    pub alarm: Option<Reading<String>>,
    pub odometer: Option<Reading<Number>>,
    pub gps: Option<Gps>,
    pub remote_start_status: Option<Reading<Number>>,
    pub battery: Option<Battery>,
    #[serde(rename = "TPMS")]
    pub tpms: Option<Tpms>,
    #[serde(rename = "elVehDTE")]
    pub el_veh_dte: Option<Reading<Number>>,
    pub battery_charge_status: Option<Reading<String>>,
    pub battery_fill_level: Option<Reading<Number>>,
    pub charging_status: Option<Reading<String>>,
    pub plug_status: Option<Reading<Number>>,
    pub charger_powertype: Option<Reading<String>>,
    pub ignition_status: Option<Reading<String>>,
    pub deep_sleep_in_progress: Option<Reading<bool>>,
    pub firmware_upg_in_progress: Option<Reading<bool>>,
    pub door_status: Option<DoorStatus>,
    pub window_position: Option<WindowPosition>,
    /// Time of the last vehicle update, `%m-%d-%Y %H:%M:%S` in UTC.
    pub last_modified_date: Option<String>,
}

/// Parse a Ford timestamp (`03-22-2021 14:57:01` or with fractional seconds).
///
/// # Errors
///
/// Returns [`Error::Timestamp`] if the string matches neither format.
pub fn parse_ford_time(text: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, FORD_TIME_FORMAT_FRACTIONAL)
        .or_else(|_| NaiveDateTime::parse_from_str(text, FORD_TIME_FORMAT))
        .map(|naive| naive.and_utc())
        .map_err(|_| Error::Timestamp(text.to_string()))
}

fn value_of<T>(reading: Option<&Reading<T>>) -> Option<&T> {
    reading.and_then(|r| r.value.as_ref())
}

impl StatusSnapshot {
    /// Parse the `vehiclestatus` document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not match the expected shape.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// When the vehicle last updated this status.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing or malformed.
    pub fn last_modified(&self) -> Result<DateTime<Utc>> {
        let text = self
            .last_modified_date
            .as_deref()
            .ok_or(Error::MissingField("lastModifiedDate"))?;
        parse_ford_time(text)
    }

    /// Ignition state, e.g. `Off`, `Start`, `Run`.
    #[must_use]
    pub fn ignition(&self) -> Option<&str> {
        value_of(self.ignition_status.as_ref()).map(String::as_str)
    }

    /// Whether the ignition is in a state that opens a trip.
    #[must_use]
    pub fn is_ignition_on(&self) -> bool {
        self.ignition().is_some_and(|v| IGNITION_ON.contains(&v))
    }

    /// Whether the ignition is off.
    #[must_use]
    pub fn is_ignition_off(&self) -> bool {
        self.ignition() == Some(IGNITION_OFF)
    }

    /// Traction battery state of charge in percent.
    #[must_use]
    pub fn battery_fill_level(&self) -> Option<f64> {
        value_of(self.battery_fill_level.as_ref()).map(|n| n.0)
    }

    /// Odometer in kilometers.
    #[must_use]
    pub fn odometer_km(&self) -> Option<f64> {
        value_of(self.odometer.as_ref()).map(|n| n.0)
    }

    /// Distance to empty in kilometers.
    #[must_use]
    pub fn range_km(&self) -> Option<f64> {
        value_of(self.el_veh_dte.as_ref()).map(|n| n.0)
    }

    /// Charging status string.
    #[must_use]
    pub fn charging_status(&self) -> Option<&str> {
        value_of(self.charging_status.as_ref()).map(String::as_str)
    }

    /// Whether the vehicle reports that it is charging.
    #[must_use]
    pub fn is_charging(&self) -> bool {
        self.charging_status()
            .is_some_and(|s| s.starts_with("Charging"))
    }

    /// Current position as (latitude, longitude).
    #[must_use]
    pub fn position(&self) -> Option<(f64, f64)> {
        self.gps
            .as_ref()
            .map(|gps| (gps.latitude.0, gps.longitude.0))
    }
}
