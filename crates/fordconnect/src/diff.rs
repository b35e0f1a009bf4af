//! Field-by-field comparison of two status snapshots.
//!
//! Only a fixed set of fields is tracked (see [`Field::ALL`]). Most are
//! compared directly; tire pressures, the range estimate and the GPS position
//! are normalized first so that sensor noise does not show up as a change.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::snapshot::{DoorStatus, Number, Reading, StatusSnapshot, WindowPosition};
use crate::units::UnitSystem;

/// A tracked status field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum Field {
    LockStatus,
    Alarm,
    Odometer,
    Gps,
    RemoteStartStatus,
    BatteryHealth,
    BatteryStatusActual,
    TirePressure,
    #[serde(rename = "elVehDTE")]
    RangeEstimate,
    BatteryChargeStatus,
    BatteryFillLevel,
    ChargingStatus,
    PlugStatus,
    ChargerPowertype,
    IgnitionStatus,
    DeepSleepInProgress,
    FirmwareUpgInProgress,
    DriverDoor,
    PassengerDoor,
    LeftRearDoor,
    RightRearDoor,
    HoodDoor,
    TailgateDoor,
    InnerTailgateDoor,
    DriverWindowPosition,
    PassWindowPosition,
    RearDriverWindowPos,
    RearPassWindowPos,
}

impl Field {
    /// Every tracked field, in reporting order.
    pub const ALL: [Self; 28] = [
        Self::LockStatus,
        Self::Alarm,
        Self::Odometer,
        Self::Gps,
        Self::RemoteStartStatus,
        Self::BatteryHealth,
        Self::BatteryStatusActual,
        Self::TirePressure,
        Self::RangeEstimate,
        Self::BatteryChargeStatus,
        Self::BatteryFillLevel,
        Self::ChargingStatus,
        Self::PlugStatus,
        Self::ChargerPowertype,
        Self::IgnitionStatus,
        Self::DeepSleepInProgress,
        Self::FirmwareUpgInProgress,
        Self::DriverDoor,
        Self::PassengerDoor,
        Self::LeftRearDoor,
        Self::RightRearDoor,
        Self::HoodDoor,
        Self::TailgateDoor,
        Self::InnerTailgateDoor,
        Self::DriverWindowPosition,
        Self::PassWindowPosition,
        Self::RearDriverWindowPos,
        Self::RearPassWindowPos,
    ];

    /// The field name as it appears in the status response.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LockStatus => "lockStatus",
            Self::Alarm => "alarm",
            Self::Odometer => "odometer",
            Self::Gps => "gps",
            Self::RemoteStartStatus => "remoteStartStatus",
            Self::BatteryHealth => "batteryHealth",
            Self::BatteryStatusActual => "batteryStatusActual",
            Self::TirePressure => "tirePressure",
            Self::RangeEstimate => "elVehDTE",
            Self::BatteryChargeStatus => "batteryChargeStatus",
            Self::BatteryFillLevel => "batteryFillLevel",
            Self::ChargingStatus => "chargingStatus",
            Self::PlugStatus => "plugStatus",
            Self::ChargerPowertype => "chargerPowertype",
            Self::IgnitionStatus => "ignitionStatus",
            Self::DeepSleepInProgress => "deepSleepInProgress",
            Self::FirmwareUpgInProgress => "firmwareUpgInProgress",
            Self::DriverDoor => "driverDoor",
            Self::PassengerDoor => "passengerDoor",
            Self::LeftRearDoor => "leftRearDoor",
            Self::RightRearDoor => "rightRearDoor",
            Self::HoodDoor => "hoodDoor",
            Self::TailgateDoor => "tailgateDoor",
            Self::InnerTailgateDoor => "innerTailgateDoor",
            Self::DriverWindowPosition => "driverWindowPosition",
            Self::PassWindowPosition => "passWindowPosition",
            Self::RearDriverWindowPos => "rearDriverWindowPos",
            Self::RearPassWindowPos => "rearPassWindowPos",
        }
    }

    /// Extract the comparable form of this field from a snapshot.
    #[allow(clippy::cast_possible_truncation)]
    fn extract(self, s: &StatusSnapshot, units: UnitSystem) -> Option<DiffValue> {
        let doors = s.door_status.as_ref();
        let windows = s.window_position.as_ref();
        let battery = s.battery.as_ref();
        match self {
            Self::LockStatus => text(s.lock_status.as_ref()),
            Self::Alarm => text(s.alarm.as_ref()),
            Self::Odometer => number(s.odometer.as_ref()),
            Self::Gps => s.gps.as_ref().map(|gps| DiffValue::Position {
                latitude: gps.latitude.0,
                longitude: gps.longitude.0,
            }),
            Self::RemoteStartStatus => number(s.remote_start_status.as_ref()),
            Self::BatteryHealth => text(battery.and_then(|b| b.battery_health.as_ref())),
            Self::BatteryStatusActual => {
                number(battery.and_then(|b| b.battery_status_actual.as_ref()))
            }
            Self::TirePressure => s
                .tpms
                .as_ref()
                .and_then(crate::snapshot::Tpms::pressures_kpa)
                .map(|kpa| DiffValue::Pressures(kpa.map(|p| units.pressure(p).round() as i64))),
            Self::RangeEstimate => s
                .range_km()
                .map(|km| DiffValue::Number(round_to(units.distance_km(km), 6))),
            Self::BatteryChargeStatus => text(s.battery_charge_status.as_ref()),
            Self::BatteryFillLevel => number(s.battery_fill_level.as_ref()),
            Self::ChargingStatus => text(s.charging_status.as_ref()),
            Self::PlugStatus => number(s.plug_status.as_ref()),
            Self::ChargerPowertype => text(s.charger_powertype.as_ref()),
            Self::IgnitionStatus => text(s.ignition_status.as_ref()),
            Self::DeepSleepInProgress => flag(s.deep_sleep_in_progress.as_ref()),
            Self::FirmwareUpgInProgress => flag(s.firmware_upg_in_progress.as_ref()),
            Self::DriverDoor => door(doors, |d| d.driver_door.as_ref()),
            Self::PassengerDoor => door(doors, |d| d.passenger_door.as_ref()),
            Self::LeftRearDoor => door(doors, |d| d.left_rear_door.as_ref()),
            Self::RightRearDoor => door(doors, |d| d.right_rear_door.as_ref()),
            Self::HoodDoor => door(doors, |d| d.hood_door.as_ref()),
            Self::TailgateDoor => door(doors, |d| d.tailgate_door.as_ref()),
            Self::InnerTailgateDoor => door(doors, |d| d.inner_tailgate_door.as_ref()),
            Self::DriverWindowPosition => window(windows, |w| w.driver_window_position.as_ref()),
            Self::PassWindowPosition => window(windows, |w| w.pass_window_position.as_ref()),
            Self::RearDriverWindowPos => window(windows, |w| w.rear_driver_window_pos.as_ref()),
            Self::RearPassWindowPos => window(windows, |w| w.rear_pass_window_pos.as_ref()),
        }
    }

    /// Turn the comparable form into the reported form.
    fn report(self, value: DiffValue) -> DiffValue {
        match (self, value) {
            (Self::RangeEstimate, DiffValue::Number(v)) => DiffValue::Number(round_to(v, 1)),
            (_, value) => value,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn text(reading: Option<&Reading<String>>) -> Option<DiffValue> {
    reading
        .and_then(|r| r.value.clone())
        .map(DiffValue::Text)
}

fn number(reading: Option<&Reading<Number>>) -> Option<DiffValue> {
    reading
        .and_then(|r| r.value)
        .map(|n| DiffValue::Number(n.0))
}

fn flag(reading: Option<&Reading<bool>>) -> Option<DiffValue> {
    reading.and_then(|r| r.value).map(DiffValue::Flag)
}

fn door(
    doors: Option<&DoorStatus>,
    pick: impl FnOnce(&DoorStatus) -> Option<&Reading<String>>,
) -> Option<DiffValue> {
    text(doors.and_then(pick))
}

fn window(
    windows: Option<&WindowPosition>,
    pick: impl FnOnce(&WindowPosition) -> Option<&Reading<String>>,
) -> Option<DiffValue> {
    text(windows.and_then(pick))
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// The new value of a changed field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DiffValue {
    /// A string state such as `LOCKED` or `Closed`.
    Text(String),
    /// A numeric reading.
    Number(f64),
    /// A boolean flag.
    Flag(bool),
    /// All four tire pressures in whole display units (LF, RF, LR, RR).
    Pressures([i64; 4]),
    /// Latitude and longitude.
    Position {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
    },
}

impl fmt::Display for DiffValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Flag(b) => write!(f, "{b}"),
            Self::Pressures([lf, rf, lr, rr]) => write!(f, "[{lf}, {rf}, {lr}, {rr}]"),
            Self::Position {
                latitude,
                longitude,
            } => write!(f, "({latitude:.5}, {longitude:.5})"),
        }
    }
}

/// Changed fields between two snapshots, keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DiffSet(BTreeMap<Field, DiffValue>);

impl DiffSet {
    /// Number of changed fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing tracked changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The new value of `field`, if it changed.
    #[must_use]
    pub fn get(&self, field: Field) -> Option<&DiffValue> {
        self.0.get(&field)
    }

    /// Whether `field` changed.
    #[must_use]
    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    /// Iterate over changed fields in reporting order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, &DiffValue)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }
}

impl fmt::Display for DiffSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}: {value}")?;
        }
        Ok(())
    }
}

/// Compare two snapshots and return the tracked fields that changed.
///
/// A field missing from `current` is never reported. A field missing from
/// `previous` but present in `current` is reported as changed.
#[must_use]
pub fn diff(previous: &StatusSnapshot, current: &StatusSnapshot, units: UnitSystem) -> DiffSet {
    let mut changes = BTreeMap::new();
    for field in Field::ALL {
        let Some(now) = field.extract(current, units) else {
            continue;
        };
        if field.extract(previous, units).as_ref() != Some(&now) {
            changes.insert(field, field.report(now));
        }
    }
    DiffSet(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{fixtures, Gps};

    #[test]
    fn test_identical_snapshots_empty() {
        let a = fixtures::parked();
        let b = fixtures::parked();
        for units in [UnitSystem::Metric, UnitSystem::Imperial] {
            assert!(diff(&a, &b, units).is_empty());
        }
    }

    #[test]
    fn test_odometer_change() {
        let a = fixtures::parked();
        let mut b = fixtures::parked();
        b.odometer = Some(Reading::new(Number(1000.5)));

        let changes = diff(&a, &b, UnitSystem::Metric);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.get(Field::Odometer), Some(&DiffValue::Number(1000.5)));
    }

    #[test]
    fn test_tire_pressure_all_or_nothing() {
        let a = fixtures::parked();
        let mut b = fixtures::parked();
        if let Some(tpms) = b.tpms.as_mut() {
            tpms.outer_left_rear_tire_pressure = Some(Reading::new(Number(240.0)));
        }

        let changes = diff(&a, &b, UnitSystem::Metric);
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes.get(Field::TirePressure),
            Some(&DiffValue::Pressures([262, 262, 240, 255]))
        );
    }

    #[test]
    fn test_tire_pressure_noise_below_rounding_ignored() {
        let a = fixtures::parked();
        let mut b = fixtures::parked();
        if let Some(tpms) = b.tpms.as_mut() {
            tpms.left_front_tire_pressure = Some(Reading::new(Number(262.3)));
        }
        assert!(diff(&a, &b, UnitSystem::Metric).is_empty());
        assert!(diff(&a, &b, UnitSystem::Imperial).is_empty());
    }

    #[test]
    fn test_range_rounding() {
        let a = fixtures::parked();
        let mut b = fixtures::parked();
        b.el_veh_dte = Some(Reading::new(Number(312.400_000_01)));
        assert!(diff(&a, &b, UnitSystem::Metric).is_empty());

        b.el_veh_dte = Some(Reading::new(Number(298.06)));
        let changes = diff(&a, &b, UnitSystem::Metric);
        assert_eq!(changes.get(Field::RangeEstimate), Some(&DiffValue::Number(298.1)));
    }

    #[test]
    fn test_range_reported_in_display_units() {
        let a = fixtures::parked();
        let mut b = fixtures::parked();
        b.el_veh_dte = Some(Reading::new(Number(100.0)));
        let changes = diff(&a, &b, UnitSystem::Imperial);
        assert_eq!(changes.get(Field::RangeEstimate), Some(&DiffValue::Number(62.1)));
    }

    #[test]
    fn test_gps_reports_both_coordinates() {
        let a = fixtures::parked();
        let mut b = fixtures::parked();
        b.gps = Some(Gps {
            latitude: Number(42.955),
            longitude: Number(-76.5),
            gps_state: None,
            timestamp: None,
        });

        let changes = diff(&a, &b, UnitSystem::Metric);
        assert_eq!(
            changes.get(Field::Gps),
            Some(&DiffValue::Position {
                latitude: 42.955,
                longitude: -76.5
            })
        );
    }

    #[test]
    fn test_door_and_ignition_changes() {
        let a = fixtures::parked();
        let mut b = fixtures::parked();
        b.ignition_status = Some(Reading::new("Run".to_string()));
        if let Some(doors) = b.door_status.as_mut() {
            doors.driver_door = Some(Reading::new("Ajar".to_string()));
        }

        let changes = diff(&a, &b, UnitSystem::Imperial);
        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes.get(Field::DriverDoor),
            Some(&DiffValue::Text("Ajar".to_string()))
        );
        assert!(changes.contains(Field::IgnitionStatus));
    }

    #[test]
    fn test_missing_in_current_not_reported() {
        let a = fixtures::parked();
        let mut b = fixtures::parked();
        b.alarm = None;
        assert!(diff(&a, &b, UnitSystem::Metric).is_empty());
    }

    #[test]
    fn test_missing_in_previous_reported() {
        let mut a = fixtures::parked();
        let b = fixtures::parked();
        a.deep_sleep_in_progress = None;
        let changes = diff(&a, &b, UnitSystem::Metric);
        assert_eq!(
            changes.get(Field::DeepSleepInProgress),
            Some(&DiffValue::Flag(false))
        );
    }

    #[test]
    fn test_metadata_only_change_ignored() {
        let a = fixtures::parked();
        let mut b = fixtures::parked();
        b.lock_status = Some(Reading {
            value: Some("LOCKED".to_string()),
            status: Some("CURRENT".to_string()),
            timestamp: Some("03-22-2021 15:00:00".to_string()),
        });
        assert!(diff(&a, &b, UnitSystem::Metric).is_empty());
    }

    #[test]
    fn test_diff_display_and_json() {
        let a = fixtures::parked();
        let mut b = fixtures::parked();
        b.lock_status = Some(Reading::new("UNLOCKED".to_string()));
        b.battery_fill_level = Some(Reading::new(Number(79.5)));

        let changes = diff(&a, &b, UnitSystem::Metric);
        assert_eq!(
            changes.to_string(),
            "lockStatus: UNLOCKED, batteryFillLevel: 79.5"
        );
        let json = serde_json::to_value(&changes).unwrap();
        assert_eq!(json["lockStatus"], "UNLOCKED");
        assert_eq!(json["batteryFillLevel"], 79.5);
    }

    #[test]
    fn test_field_names_unique() {
        let mut names: Vec<_> = Field::ALL.iter().map(|f| f.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Field::ALL.len());
    }
}
