//! Display unit conversion.
//!
//! The vehicle APIs report speeds in meters per second, distances and
//! elevations in meters (odometer and range in kilometers) and tire pressures
//! in kilopascals. Everything shown to the user goes through [`UnitSystem`].

use serde::{Deserialize, Serialize};

const KM_TO_MILES: f64 = 0.6214;
const M_TO_FT: f64 = 3.2808;
const KPA_TO_PSI: f64 = 0.145_038;
const MPS_TO_KPH: f64 = 3.6;

/// Multiplicative factors from base units to display units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversions {
    /// m/s to display speed.
    pub speed: f64,
    /// Meters to display distance.
    pub distance: f64,
    /// Meters to display elevation.
    pub elevation: f64,
    /// kPa to display pressure.
    pub pressure: f64,
}

/// Display unit labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Labels {
    /// Speed unit.
    pub speed: &'static str,
    /// Distance unit.
    pub distance: &'static str,
    /// Elevation unit.
    pub elevation: &'static str,
    /// Pressure unit.
    pub pressure: &'static str,
}

const METRIC: Conversions = Conversions {
    speed: MPS_TO_KPH,
    distance: 0.001,
    elevation: 1.0,
    pressure: 1.0,
};

const IMPERIAL: Conversions = Conversions {
    speed: MPS_TO_KPH * KM_TO_MILES,
    distance: 0.001 * KM_TO_MILES,
    elevation: M_TO_FT,
    pressure: KPA_TO_PSI,
};

const METRIC_LABELS: Labels = Labels {
    speed: "kph",
    distance: "km",
    elevation: "m",
    pressure: "kPa",
};

const IMPERIAL_LABELS: Labels = Labels {
    speed: "mph",
    distance: "miles",
    elevation: "ft",
    pressure: "psi",
};

/// Which set of display units to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSystem {
    /// Kilometers, kph, meters, kPa.
    Metric,
    /// Miles, mph, feet, psi.
    #[default]
    Imperial,
}

impl UnitSystem {
    /// Conversion factors for this system.
    #[must_use]
    pub const fn conversions(self) -> Conversions {
        match self {
            Self::Metric => METRIC,
            Self::Imperial => IMPERIAL,
        }
    }

    /// Unit labels for this system.
    #[must_use]
    pub const fn labels(self) -> Labels {
        match self {
            Self::Metric => METRIC_LABELS,
            Self::Imperial => IMPERIAL_LABELS,
        }
    }

    /// Meters per second to display speed.
    #[must_use]
    pub fn speed(self, mps: f64) -> f64 {
        mps * self.conversions().speed
    }

    /// Meters to display distance.
    #[must_use]
    pub fn distance(self, meters: f64) -> f64 {
        meters * self.conversions().distance
    }

    /// Kilometers to display distance.
    #[must_use]
    pub fn distance_km(self, km: f64) -> f64 {
        self.distance(km * 1000.0)
    }

    /// Display distance back to meters.
    #[must_use]
    pub fn distance_to_meters(self, display: f64) -> f64 {
        display / self.conversions().distance
    }

    /// Meters to display elevation.
    #[must_use]
    pub fn elevation(self, meters: f64) -> f64 {
        meters * self.conversions().elevation
    }

    /// Display elevation back to meters.
    #[must_use]
    pub fn elevation_to_meters(self, display: f64) -> f64 {
        display / self.conversions().elevation
    }

    /// kPa to display pressure.
    #[must_use]
    pub fn pressure(self, kpa: f64) -> f64 {
        kpa * self.conversions().pressure
    }
}

impl std::fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Metric => write!(f, "metric"),
            Self::Imperial => write!(f, "imperial"),
        }
    }
}
