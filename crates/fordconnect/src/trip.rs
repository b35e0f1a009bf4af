//! Trip windows and trip accounting.
//!
//! A trip is the interval between the ignition turning on (`Start`/`Run`) and
//! turning `Off`. [`TripTracker`] watches successive snapshots for those
//! transitions and hands back a [`TripWindow`] when one closes;
//! [`TripAccountant`] turns the window into a [`TripSummary`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::elevation::ElevationLookup;
use crate::error::{Error, Result};
use crate::snapshot::StatusSnapshot;
use crate::units::UnitSystem;

/// Efficiency reported when no energy was used.
pub const EFFICIENCY_SENTINEL: f64 = 99.999;

/// Usable capacity of the standard range pack.
pub const STANDARD_RANGE_KWH: f64 = 68.0;

/// Usable capacity of the extended range pack.
pub const EXTENDED_RANGE_KWH: f64 = 88.0;

/// Snapshots bounding one ignition-on to ignition-off interval.
#[derive(Debug, Clone, PartialEq)]
pub struct TripWindow {
    start: StatusSnapshot,
    end: StatusSnapshot,
}

impl TripWindow {
    /// Pair two snapshots, checking that `end` is not older than `start`.
    ///
    /// # Errors
    ///
    /// Returns an error if either timestamp is missing or malformed, or if the
    /// end precedes the start.
    pub fn new(start: StatusSnapshot, end: StatusSnapshot) -> Result<Self> {
        let (started, ended) = (start.last_modified()?, end.last_modified()?);
        if ended < started {
            return Err(Error::TripOrder {
                start: started.to_string(),
                end: ended.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Snapshot taken at ignition on.
    #[must_use]
    pub fn start(&self) -> &StatusSnapshot {
        &self.start
    }

    /// Snapshot taken at ignition off.
    #[must_use]
    pub fn end(&self) -> &StatusSnapshot {
        &self.end
    }
}

/// Watches ignition transitions and opens/closes trip windows.
#[derive(Debug, Default)]
pub struct TripTracker {
    start: Option<StatusSnapshot>,
    was_on: bool,
}

impl TripTracker {
    /// Create a tracker with no open window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a trip is in progress.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.start.is_some()
    }

    /// Feed the next snapshot; returns the window if this snapshot closed one.
    ///
    /// A transition into `Start`/`Run` while a window is already open replaces
    /// the start snapshot. A window whose end precedes its start is dropped.
    pub fn observe(&mut self, snapshot: &StatusSnapshot) -> Option<TripWindow> {
        let on = snapshot.is_ignition_on();
        let mut closed = None;

        if on && !self.was_on {
            if self.start.is_some() {
                warn!("Ignition started again before the previous trip ended, restarting trip");
            } else {
                info!("Trip started");
            }
            self.start = Some(snapshot.clone());
        } else if snapshot.is_ignition_off() {
            if let Some(start) = self.start.take() {
                match TripWindow::new(start, snapshot.clone()) {
                    Ok(window) => {
                        info!("Trip ended");
                        closed = Some(window);
                    }
                    Err(e) => warn!("Discarding trip: {e}"),
                }
            }
        }

        self.was_on = on;
        closed
    }
}

/// Statistics for one completed trip, in display units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripSummary {
    /// Ignition on.
    pub started: DateTime<Utc>,
    /// Ignition off.
    pub ended: DateTime<Utc>,
    /// Duration in hours.
    pub elapsed_hours: f64,
    /// State of charge consumed, in percentage points.
    pub percent_used: f64,
    /// Energy consumed.
    pub kwh_used: f64,
    /// Distance driven.
    pub distance: f64,
    /// Distance per kWh, or [`EFFICIENCY_SENTINEL`] when no energy was used.
    pub efficiency: f64,
    /// Average speed over the window.
    pub average_speed: f64,
    /// End elevation minus start elevation, if it could be looked up.
    pub elevation_delta: Option<f64>,
    /// Units the figures are expressed in.
    pub units: UnitSystem,
}

impl fmt::Display for TripSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = self.units.labels();
        write!(
            f,
            "{:.2} hours, {:.2} {}, {:.1} kWh used ({:.1}%), {:.2} {}/kWh, {:.1} {} average",
            self.elapsed_hours,
            self.distance,
            labels.distance,
            self.kwh_used,
            self.percent_used,
            self.efficiency,
            labels.distance,
            self.average_speed,
            labels.speed,
        )?;
        if let Some(delta) = self.elevation_delta {
            write!(f, ", elevation change {delta:.0} {}", labels.elevation)?;
        }
        Ok(())
    }
}

/// Computes trip statistics from a closed window.
#[derive(Debug, Clone, Copy)]
pub struct TripAccountant {
    capacity_kwh: f64,
    units: UnitSystem,
}

impl TripAccountant {
    /// Create an accountant for a pack of `capacity_kwh`.
    #[must_use]
    pub fn new(capacity_kwh: f64, units: UnitSystem) -> Self {
        Self {
            capacity_kwh,
            units,
        }
    }

    /// Compute the summary, looking up elevations if a lookup is given.
    ///
    /// A failed elevation lookup only drops the elevation figure.
    ///
    /// # Errors
    ///
    /// Returns an error if a snapshot lacks the timestamp, odometer or
    /// battery fill level.
    pub async fn account(
        &self,
        window: &TripWindow,
        elevation: Option<&dyn ElevationLookup>,
    ) -> Result<TripSummary> {
        let delta_m = match (elevation, window.start.position(), window.end.position()) {
            (Some(lookup), Some(from), Some(to)) => {
                match elevation_change(lookup, from, to).await {
                    Ok(delta) => Some(delta),
                    Err(e) => {
                        warn!("Elevation lookup failed: {e}");
                        None
                    }
                }
            }
            _ => None,
        };
        self.compute(&window.start, &window.end, delta_m)
    }

    /// Compute the summary from two snapshots and an elevation delta in meters.
    ///
    /// # Errors
    ///
    /// Returns an error if a snapshot lacks the timestamp, odometer or
    /// battery fill level.
    pub fn compute(
        &self,
        start: &StatusSnapshot,
        end: &StatusSnapshot,
        elevation_delta_m: Option<f64>,
    ) -> Result<TripSummary> {
        let started = start.last_modified()?;
        let ended = end.last_modified()?;
        #[allow(clippy::cast_precision_loss)]
        let elapsed_hours = (ended - started).num_milliseconds() as f64 / 3_600_000.0;

        let soc = |s: &StatusSnapshot| {
            s.battery_fill_level()
                .ok_or(Error::MissingField("batteryFillLevel"))
        };
        let odometer = |s: &StatusSnapshot| s.odometer_km().ok_or(Error::MissingField("odometer"));

        let percent_used = soc(start)? - soc(end)?;
        let kwh_used = percent_used / 100.0 * self.capacity_kwh;
        let distance = self.units.distance_km(odometer(end)? - odometer(start)?);

        let efficiency = if kwh_used > 0.0 {
            distance / kwh_used
        } else {
            EFFICIENCY_SENTINEL
        };
        let average_speed = if elapsed_hours > 0.0 {
            distance / elapsed_hours
        } else {
            0.0
        };

        let summary = TripSummary {
            started,
            ended,
            elapsed_hours,
            percent_used,
            kwh_used,
            distance,
            efficiency,
            average_speed,
            elevation_delta: elevation_delta_m.map(|m| self.units.elevation(m)),
            units: self.units,
        };
        debug!(?summary, "Trip accounted");
        Ok(summary)
    }
}

async fn elevation_change(
    lookup: &dyn ElevationLookup,
    from: (f64, f64),
    to: (f64, f64),
) -> Result<f64> {
    let start = lookup.elevation_m(from.0, from.1).await?;
    let end = lookup.elevation_m(to.0, to.1).await?;
    Ok(end - start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::init_test_logging;
    use crate::snapshot::{fixtures, Number, Reading};
    use async_trait::async_trait;

    fn snapshot(ignition: &str, soc: f64, odometer: f64, modified: &str) -> StatusSnapshot {
        let mut s = fixtures::parked();
        s.ignition_status = Some(Reading::new(ignition.to_string()));
        s.battery_fill_level = Some(Reading::new(Number(soc)));
        s.odometer = Some(Reading::new(Number(odometer)));
        s.last_modified_date = Some(modified.to_string());
        s
    }

    struct FixedElevation {
        start: f64,
        end: f64,
    }

    #[async_trait]
    impl ElevationLookup for FixedElevation {
        async fn elevation_m(&self, latitude: f64, _longitude: f64) -> Result<f64> {
            // the fixture's start latitude is 42.955
            if (latitude - 42.955).abs() < 1e-9 {
                Ok(self.start)
            } else {
                Ok(self.end)
            }
        }
    }

    struct BrokenElevation;

    #[async_trait]
    impl ElevationLookup for BrokenElevation {
        async fn elevation_m(&self, _latitude: f64, _longitude: f64) -> Result<f64> {
            Err(Error::unexpected("USGS", "down"))
        }
    }

    #[test]
    fn test_example_trip() {
        let start = snapshot("Run", 80.0, 1000.0, "03-22-2021 10:00:00");
        let end = snapshot("Off", 60.0, 1100.0, "03-22-2021 12:00:00");
        let accountant = TripAccountant::new(STANDARD_RANGE_KWH, UnitSystem::Metric);

        let summary = accountant.compute(&start, &end, None).unwrap();
        assert!((summary.kwh_used - 13.6).abs() < 1e-9);
        assert!((summary.percent_used - 20.0).abs() < 1e-9);
        assert!((summary.distance - 100.0).abs() < 1e-9);
        assert!((summary.efficiency - 7.352_941).abs() < 1e-5);
        assert!((summary.elapsed_hours - 2.0).abs() < 1e-9);
        assert!((summary.average_speed - 50.0).abs() < 1e-9);
        assert!(summary.elevation_delta.is_none());
    }

    #[test]
    fn test_zero_energy_uses_sentinel() {
        let start = snapshot("Run", 70.0, 1000.0, "03-22-2021 10:00:00");
        let end = snapshot("Off", 70.0, 1003.0, "03-22-2021 10:10:00");
        let summary = TripAccountant::new(EXTENDED_RANGE_KWH, UnitSystem::Metric)
            .compute(&start, &end, None)
            .unwrap();
        assert_eq!(summary.kwh_used, 0.0);
        assert_eq!(summary.efficiency, EFFICIENCY_SENTINEL);
    }

    #[test]
    fn test_negative_energy_uses_sentinel() {
        // regenerative braking downhill can leave the pack fuller
        let start = snapshot("Run", 70.0, 1000.0, "03-22-2021 10:00:00");
        let end = snapshot("Off", 71.0, 1005.0, "03-22-2021 10:10:00");
        let summary = TripAccountant::new(EXTENDED_RANGE_KWH, UnitSystem::Imperial)
            .compute(&start, &end, None)
            .unwrap();
        assert!(summary.kwh_used < 0.0);
        assert_eq!(summary.efficiency, EFFICIENCY_SENTINEL);
    }

    #[test]
    fn test_zero_elapsed_time() {
        let start = snapshot("Run", 70.0, 1000.0, "03-22-2021 10:00:00");
        let end = snapshot("Off", 70.0, 1000.0, "03-22-2021 10:00:00");
        let summary = TripAccountant::new(EXTENDED_RANGE_KWH, UnitSystem::Metric)
            .compute(&start, &end, None)
            .unwrap();
        assert_eq!(summary.average_speed, 0.0);
    }

    #[test]
    fn test_imperial_elevation() {
        let start = snapshot("Run", 80.0, 1000.0, "03-22-2021 10:00:00");
        let end = snapshot("Off", 60.0, 1100.0, "03-22-2021 12:00:00");
        let summary = TripAccountant::new(STANDARD_RANGE_KWH, UnitSystem::Imperial)
            .compute(&start, &end, Some(100.0))
            .unwrap();
        assert!((summary.elevation_delta.unwrap() - 328.08).abs() < 1e-9);
        assert!((summary.distance - 62.14).abs() < 1e-9);
    }

    #[test]
    fn test_missing_battery_level() {
        let start = snapshot("Run", 80.0, 1000.0, "03-22-2021 10:00:00");
        let mut end = snapshot("Off", 60.0, 1100.0, "03-22-2021 12:00:00");
        end.battery_fill_level = None;
        let err = TripAccountant::new(STANDARD_RANGE_KWH, UnitSystem::Metric)
            .compute(&start, &end, None)
            .unwrap_err();
        assert!(matches!(err, Error::MissingField("batteryFillLevel")));
    }

    #[test]
    fn test_window_rejects_reversed_order() {
        let start = snapshot("Run", 80.0, 1000.0, "03-22-2021 12:00:00");
        let end = snapshot("Off", 60.0, 1100.0, "03-22-2021 10:00:00");
        assert!(matches!(
            TripWindow::new(start, end),
            Err(Error::TripOrder { .. })
        ));
    }

    #[tokio::test]
    async fn test_account_with_elevation() {
        let start = snapshot("Run", 80.0, 1000.0, "03-22-2021 10:00:00");
        let mut end = snapshot("Off", 60.0, 1100.0, "03-22-2021 12:00:00");
        if let Some(gps) = end.gps.as_mut() {
            gps.latitude = Number(43.1);
        }
        let window = TripWindow::new(start, end).unwrap();
        let lookup = FixedElevation {
            start: 150.0,
            end: 210.0,
        };

        let summary = TripAccountant::new(STANDARD_RANGE_KWH, UnitSystem::Metric)
            .account(&window, Some(&lookup as &dyn ElevationLookup))
            .await
            .unwrap();
        assert!((summary.elevation_delta.unwrap() - 60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_account_elevation_failure_is_not_fatal() {
        init_test_logging();
        let start = snapshot("Run", 80.0, 1000.0, "03-22-2021 10:00:00");
        let end = snapshot("Off", 60.0, 1100.0, "03-22-2021 12:00:00");
        let window = TripWindow::new(start, end).unwrap();

        let summary = TripAccountant::new(STANDARD_RANGE_KWH, UnitSystem::Metric)
            .account(&window, Some(&BrokenElevation as &dyn ElevationLookup))
            .await
            .unwrap();
        assert!(summary.elevation_delta.is_none());
        assert!((summary.kwh_used - 13.6).abs() < 1e-9);
    }

    #[test]
    fn test_tracker_full_window() {
        let mut tracker = TripTracker::new();
        assert!(tracker
            .observe(&snapshot("Off", 80.0, 1000.0, "03-22-2021 09:00:00"))
            .is_none());
        assert!(tracker
            .observe(&snapshot("Start", 80.0, 1000.0, "03-22-2021 10:00:00"))
            .is_none());
        assert!(tracker.is_open());
        assert!(tracker
            .observe(&snapshot("Run", 75.0, 1040.0, "03-22-2021 11:00:00"))
            .is_none());

        let window = tracker
            .observe(&snapshot("Off", 60.0, 1100.0, "03-22-2021 12:00:00"))
            .unwrap();
        assert!(!tracker.is_open());
        assert_eq!(window.start().battery_fill_level(), Some(80.0));
        assert_eq!(window.end().odometer_km(), Some(1100.0));
    }

    #[test]
    fn test_tracker_off_without_start() {
        let mut tracker = TripTracker::new();
        assert!(tracker
            .observe(&snapshot("Off", 80.0, 1000.0, "03-22-2021 09:00:00"))
            .is_none());
        assert!(!tracker.is_open());
    }

    #[test]
    fn test_tracker_restart_keeps_most_recent_start() {
        init_test_logging();
        let mut tracker = TripTracker::new();
        tracker.observe(&snapshot("Run", 90.0, 1000.0, "03-22-2021 09:00:00"));
        tracker.observe(&snapshot("Accessory", 89.0, 1010.0, "03-22-2021 09:30:00"));
        tracker.observe(&snapshot("Run", 85.0, 1010.0, "03-22-2021 10:00:00"));

        let window = tracker
            .observe(&snapshot("Off", 60.0, 1100.0, "03-22-2021 12:00:00"))
            .unwrap();
        assert_eq!(window.start().battery_fill_level(), Some(85.0));
    }

    #[test]
    fn test_tracker_drops_reversed_window() {
        init_test_logging();
        let mut tracker = TripTracker::new();
        tracker.observe(&snapshot("Run", 90.0, 1000.0, "03-22-2021 12:00:00"));
        assert!(tracker
            .observe(&snapshot("Off", 60.0, 1100.0, "03-22-2021 10:00:00"))
            .is_none());
        assert!(!tracker.is_open());
    }

    #[test]
    fn test_summary_display() {
        let start = snapshot("Run", 80.0, 1000.0, "03-22-2021 10:00:00");
        let end = snapshot("Off", 60.0, 1100.0, "03-22-2021 12:00:00");
        let summary = TripAccountant::new(STANDARD_RANGE_KWH, UnitSystem::Metric)
            .compute(&start, &end, Some(12.0))
            .unwrap();
        let text = summary.to_string();
        assert!(text.contains("100.00 km"));
        assert!(text.contains("13.6 kWh"));
        assert!(text.contains("7.35 km/kWh"));
        assert!(text.contains("elevation change 12 m"));
    }
}
